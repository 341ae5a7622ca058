//! Per-frame stage ordering.
//!
//! Every frame walks `ClearBuffers → ShadowPass → RestoreViewport → MainPass →
//! Present`. [`FrameSequencer`] records the walk, rejects any other order, and
//! tracks how the shadow map is bound at each point. The shadow map is a depth
//! target only inside `ShadowPass` and a sampled texture only inside
//! `MainPass`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    ClearBuffers,
    ShadowPass,
    RestoreViewport,
    MainPass,
    Present,
}

impl FrameStage {
    pub const ORDER: [FrameStage; 5] = [
        FrameStage::ClearBuffers,
        FrameStage::ShadowPass,
        FrameStage::RestoreViewport,
        FrameStage::MainPass,
        FrameStage::Present,
    ];

    /// The stage allowed after `self`; `None` after `Present`.
    pub fn next(self) -> Option<FrameStage> {
        match self {
            Self::ClearBuffers => Some(Self::ShadowPass),
            Self::ShadowPass => Some(Self::RestoreViewport),
            Self::RestoreViewport => Some(Self::MainPass),
            Self::MainPass => Some(Self::Present),
            Self::Present => None,
        }
    }

    /// How the shadow map is bound while this stage runs.
    pub fn shadow_map_binding(self) -> ShadowMapBinding {
        match self {
            Self::ShadowPass => ShadowMapBinding::DepthTarget,
            Self::MainPass => ShadowMapBinding::Sampled,
            _ => ShadowMapBinding::Unbound,
        }
    }
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shadow map binding state. A single value, so it can never be a depth
/// target and a sampled texture at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShadowMapBinding {
    #[default]
    Unbound,
    DepthTarget,
    Sampled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameOrderError {
    #[error("frame {frame}: stage {attempted} cannot follow {}", describe(.current))]
    OutOfOrder {
        frame: u64,
        current: Option<FrameStage>,
        attempted: FrameStage,
    },

    #[error("frame {frame} was abandoned at {stage} without presenting")]
    Abandoned { frame: u64, stage: FrameStage },
}

fn describe(stage: &Option<FrameStage>) -> String {
    stage.map_or_else(|| "frame start".to_string(), |s| s.to_string())
}

#[derive(Debug, Default)]
pub struct FrameSequencer {
    frame: u64,
    current: Option<FrameStage>,
    binding: ShadowMapBinding,
    history: Vec<FrameStage>,
}

impl FrameSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new frame. Reports the previous frame if it never reached
    /// `Present`; the new frame starts either way.
    pub fn begin_frame(&mut self) -> Result<u64, FrameOrderError> {
        let abandoned = match self.current {
            Some(stage) if stage != FrameStage::Present => Some(FrameOrderError::Abandoned {
                frame: self.frame,
                stage,
            }),
            _ => None,
        };
        if self.current.is_some() {
            self.frame += 1;
        }
        self.current = None;
        self.binding = ShadowMapBinding::Unbound;
        self.history.clear();
        match abandoned {
            Some(err) => Err(err),
            None => Ok(self.frame),
        }
    }

    /// Moves to `stage`. Out-of-order transitions leave the state unchanged.
    pub fn advance(&mut self, stage: FrameStage) -> Result<(), FrameOrderError> {
        let expected = match self.current {
            None => Some(FrameStage::ClearBuffers),
            Some(current) => current.next(),
        };
        if expected != Some(stage) {
            return Err(FrameOrderError::OutOfOrder {
                frame: self.frame,
                current: self.current,
                attempted: stage,
            });
        }
        self.current = Some(stage);
        self.binding = stage.shadow_map_binding();
        self.history.push(stage);
        Ok(())
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn current(&self) -> Option<FrameStage> {
        self.current
    }

    pub fn shadow_map_binding(&self) -> ShadowMapBinding {
        self.binding
    }

    /// Stages entered so far this frame.
    pub fn history(&self) -> &[FrameStage] {
        &self.history
    }

    pub fn is_complete(&self) -> bool {
        self.current == Some(FrameStage::Present)
    }
}
