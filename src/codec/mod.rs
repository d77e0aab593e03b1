//! Binary dump file format (spec §5): a length-prefixed, type-tagged frame
//! stream carrying a header followed by an interleaved sequence of keyframe
//! and delta frames.

pub mod frame;
pub mod writer;
pub mod reader;

pub use frame::{DumpHeader, Frame};
pub use reader::{DeltaSummary, DumpDuration, DumpReader, DumpStats, Snapshots};
pub use writer::DumpWriter;
