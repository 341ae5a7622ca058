//! Scene data: transforms, cameras, meshes, materials, entities, and lights,
//! owned by a single [`SceneContext`].
//!
//! Meshes and materials live in arenas and are shared between entities by
//! handle. Nothing here touches the GPU.

pub mod camera;
pub mod demo;
pub mod material;
pub mod mesh;
pub mod obj;
pub mod primitives;
pub mod scene;
pub mod transform;

pub use camera::Camera;
pub use demo::{DemoOptions, build_demo_scene};
pub use material::{Material, MaterialTextures, SamplerKind};
pub use mesh::{MeshData, Vertex, compute_tangents};
pub use obj::{ObjError, load_obj, parse_obj};
pub use scene::{Entity, MaterialHandle, MeshHandle, SceneContext};
pub use transform::Transform;
