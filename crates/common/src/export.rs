//! Tensor export registry.
//!
//! A fixed table from slot index to element type and shape template. Backends
//! allocate one buffer per row; the manager reinterprets a backend buffer as
//! a tensor by resolving the same row. Rows never move: append new slots at
//! the end and bump [`EXPORT_SCHEMA_VERSION`].

use crate::consts::{ACTION_DIMS, MAX_AGENTS, MAX_BOXES, MAX_RAMPS, NUM_LIDAR_SAMPLES};
use serde::{Deserialize, Serialize};

/// Bumped whenever a row of [`EXPORT_TABLE`] changes.
pub const EXPORT_SCHEMA_VERSION: u32 = 1;

/// Number of rows in [`EXPORT_TABLE`].
pub const NUM_EXPORTED_BUFFERS: usize = 15;

/// Element type of an exported tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Int32,
    Float32,
    UInt8,
}

impl ElementType {
    pub fn size_bytes(self) -> usize {
        match self {
            Self::Int32 | Self::Float32 => 4,
            Self::UInt8 => 1,
        }
    }
}

/// One dimension of a shape template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeDim {
    /// The configured world count.
    Worlds,
    Agents,
    /// Every agent except the observer.
    OtherAgents,
    Boxes,
    Ramps,
    /// Boxes, then ramps, then agents.
    AllEntities,
    Fixed(usize),
}

impl ShapeDim {
    pub fn resolve(self, num_worlds: usize) -> usize {
        match self {
            Self::Worlds => num_worlds,
            Self::Agents => MAX_AGENTS,
            Self::OtherAgents => MAX_AGENTS - 1,
            Self::Boxes => MAX_BOXES,
            Self::Ramps => MAX_RAMPS,
            Self::AllEntities => MAX_BOXES + MAX_RAMPS + MAX_AGENTS,
            Self::Fixed(n) => n,
        }
    }
}

/// Named export slots, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExportSlot {
    Reset = 0,
    Done = 1,
    PrepCounter = 2,
    Action = 3,
    Reward = 4,
    AgentType = 5,
    AgentMask = 6,
    AgentData = 7,
    BoxData = 8,
    RampData = 9,
    VisibleAgentsMask = 10,
    VisibleBoxesMask = 11,
    VisibleRampsMask = 12,
    GlobalPositions = 13,
    Lidar = 14,
}

/// A row of the export registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportEntry {
    pub slot: ExportSlot,
    pub name: &'static str,
    pub element_type: ElementType,
    /// Always starts with [`ShapeDim::Worlds`].
    pub shape: &'static [ShapeDim],
    /// Written by the external process and read by the next step.
    pub writable: bool,
}

use ShapeDim::{AllEntities, Agents, Boxes, Fixed, OtherAgents, Ramps, Worlds};

pub const EXPORT_TABLE: [ExportEntry; NUM_EXPORTED_BUFFERS] = [
    ExportEntry {
        slot: ExportSlot::Reset,
        name: "reset",
        element_type: ElementType::Int32,
        shape: &[Worlds, Fixed(3)],
        writable: true,
    },
    ExportEntry {
        slot: ExportSlot::Done,
        name: "done",
        element_type: ElementType::Int32,
        shape: &[Worlds, Fixed(1)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::PrepCounter,
        name: "prepCounter",
        element_type: ElementType::Int32,
        shape: &[Worlds, Fixed(1)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::Action,
        name: "action",
        element_type: ElementType::Int32,
        shape: &[Worlds, Agents, Fixed(ACTION_DIMS)],
        writable: true,
    },
    ExportEntry {
        slot: ExportSlot::Reward,
        name: "reward",
        element_type: ElementType::Float32,
        shape: &[Worlds, Agents, Fixed(1)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::AgentType,
        name: "agentType",
        element_type: ElementType::Int32,
        shape: &[Worlds, Agents, Fixed(1)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::AgentMask,
        name: "agentMask",
        element_type: ElementType::Float32,
        shape: &[Worlds, Agents, Fixed(1)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::AgentData,
        name: "agentData",
        element_type: ElementType::Float32,
        shape: &[Worlds, Agents, OtherAgents, Fixed(4)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::BoxData,
        name: "boxData",
        element_type: ElementType::Float32,
        shape: &[Worlds, Agents, Boxes, Fixed(7)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::RampData,
        name: "rampData",
        element_type: ElementType::Float32,
        shape: &[Worlds, Agents, Ramps, Fixed(5)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::VisibleAgentsMask,
        name: "visibleAgentsMask",
        element_type: ElementType::Float32,
        shape: &[Worlds, Agents, OtherAgents, Fixed(1)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::VisibleBoxesMask,
        name: "visibleBoxesMask",
        element_type: ElementType::Float32,
        shape: &[Worlds, Agents, Boxes, Fixed(1)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::VisibleRampsMask,
        name: "visibleRampsMask",
        element_type: ElementType::Float32,
        shape: &[Worlds, Agents, Ramps, Fixed(1)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::GlobalPositions,
        name: "globalPositions",
        element_type: ElementType::Float32,
        shape: &[Worlds, AllEntities, Fixed(2)],
        writable: false,
    },
    ExportEntry {
        slot: ExportSlot::Lidar,
        name: "lidar",
        element_type: ElementType::Float32,
        shape: &[Worlds, Agents, Fixed(NUM_LIDAR_SAMPLES)],
        writable: false,
    },
];

impl ExportSlot {
    pub const ALL: [Self; NUM_EXPORTED_BUFFERS] = [
        Self::Reset,
        Self::Done,
        Self::PrepCounter,
        Self::Action,
        Self::Reward,
        Self::AgentType,
        Self::AgentMask,
        Self::AgentData,
        Self::BoxData,
        Self::RampData,
        Self::VisibleAgentsMask,
        Self::VisibleBoxesMask,
        Self::VisibleRampsMask,
        Self::GlobalPositions,
        Self::Lidar,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn entry(self) -> &'static ExportEntry {
        &EXPORT_TABLE[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn element_type(self) -> ElementType {
        self.entry().element_type
    }

    pub fn is_writable(self) -> bool {
        self.entry().writable
    }

    /// Elements owned by a single world: the product of every dimension
    /// after the leading world axis.
    pub fn per_world_len(self) -> usize {
        self.entry().shape[1..]
            .iter()
            .map(|d| d.resolve(1))
            .product()
    }

    /// Concrete shape for a world count.
    pub fn shape(self, num_worlds: usize) -> Vec<usize> {
        self.entry()
            .shape
            .iter()
            .map(|d| d.resolve(num_worlds))
            .collect()
    }
}

/// Resolve a raw slot index into its element type and concrete shape.
/// `None` for indices outside the table.
pub fn resolve(slot: usize, num_worlds: usize) -> Option<(ElementType, Vec<usize>)> {
    let slot = ExportSlot::from_index(slot)?;
    Some((slot.element_type(), slot.shape(num_worlds)))
}

/// Rendered outputs. Their shape depends on the configured view size, so
/// they live outside [`EXPORT_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Depth,
    Rgb,
}

impl ImageKind {
    pub fn element_type(self) -> ElementType {
        match self {
            Self::Depth => ElementType::Float32,
            Self::Rgb => ElementType::UInt8,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            Self::Depth => 1,
            Self::Rgb => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::Rgb => "rgb",
        }
    }
}

/// `[W, A, height, width, channels]`.
pub fn resolve_image(
    kind: ImageKind,
    num_worlds: usize,
    width: usize,
    height: usize,
) -> (ElementType, Vec<usize>) {
    (
        kind.element_type(),
        vec![num_worlds, MAX_AGENTS, height, width, kind.channels()],
    )
}
