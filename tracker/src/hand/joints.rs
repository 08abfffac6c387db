//! Hand joint definitions for the 21-landmark detector convention.
//!
//! Wrist plus four joints per digit, ordered the way the landmark
//! detector reports them.  Each joint belongs to a class that drives
//! how much temporal smoothing it receives.

use serde::Deserialize;

// ── Joint definitions ──────────────────────────────────────

/// The 21 joints reported by the 2D landmark detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum JointId {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    LittleMcp,
    LittlePip,
    LittleDip,
    LittleTip,
}

/// Total number of joints per hand.
pub const JOINT_COUNT: usize = 21;

/// All joints in detector order, matching `JointId::index`.
pub const ALL_JOINTS: [JointId; JOINT_COUNT] = [
    JointId::Wrist,
    JointId::ThumbCmc,
    JointId::ThumbMcp,
    JointId::ThumbIp,
    JointId::ThumbTip,
    JointId::IndexMcp,
    JointId::IndexPip,
    JointId::IndexDip,
    JointId::IndexTip,
    JointId::MiddleMcp,
    JointId::MiddlePip,
    JointId::MiddleDip,
    JointId::MiddleTip,
    JointId::RingMcp,
    JointId::RingPip,
    JointId::RingDip,
    JointId::RingTip,
    JointId::LittleMcp,
    JointId::LittlePip,
    JointId::LittleDip,
    JointId::LittleTip,
];

/// Smoothing class of a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointClass {
    /// Anchors the whole skeleton.
    Wrist,
    /// CMC and MCP joints.
    Base,
    /// Proximal interphalangeal joints.
    Proximal,
    /// Distal interphalangeal joints and the thumb IP joint.
    Distal,
    Tip,
}

impl JointClass {
    /// Offset applied to the base smoothing factor for this class.
    pub fn smoothing_offset(&self) -> f32 {
        match self {
            Self::Wrist => -0.15,
            Self::Base => 0.0,
            Self::Proximal => 0.03,
            Self::Distal => 0.06,
            Self::Tip => 0.10,
        }
    }
}

impl JointId {
    /// Convert joint enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Joint for a detector index, if in range.
    pub fn from_index(index: usize) -> Option<Self> {
        ALL_JOINTS.get(index).copied()
    }

    pub fn class(&self) -> JointClass {
        match self {
            Self::Wrist => JointClass::Wrist,
            Self::ThumbCmc
            | Self::ThumbMcp
            | Self::IndexMcp
            | Self::MiddleMcp
            | Self::RingMcp
            | Self::LittleMcp => JointClass::Base,
            Self::IndexPip | Self::MiddlePip | Self::RingPip | Self::LittlePip => {
                JointClass::Proximal
            }
            Self::ThumbIp
            | Self::IndexDip
            | Self::MiddleDip
            | Self::RingDip
            | Self::LittleDip => JointClass::Distal,
            Self::ThumbTip
            | Self::IndexTip
            | Self::MiddleTip
            | Self::RingTip
            | Self::LittleTip => JointClass::Tip,
        }
    }

    /// Stable kebab-case name used in frame logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::LittleMcp => "little-mcp",
            Self::LittlePip => "little-pip",
            Self::LittleDip => "little-dip",
            Self::LittleTip => "little-tip",
        }
    }

    /// Parse a joint from its kebab-case name.
    pub fn parse(s: &str) -> Option<Self> {
        ALL_JOINTS.iter().copied().find(|j| j.as_str() == s)
    }

    /// The four non-thumb fingertips used for swipe tracking.
    pub fn swipe_fingertips() -> [JointId; 4] {
        [Self::IndexTip, Self::MiddleTip, Self::RingTip, Self::LittleTip]
    }
}

impl TryFrom<String> for JointId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown joint name: {value}"))
    }
}

// ── Tests ──────────────────────────────────────────────────
