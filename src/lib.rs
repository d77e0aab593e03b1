// Library modules
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pty;
pub mod record;
pub mod scene;
pub mod snapshot;
pub mod terminal;

// Re-export commonly used types
pub use channel::{Channel, ChannelError, Frame as ChannelFrame, LoggingChannel, RecordingChannel};
pub use codec::{DeltaSummary, DumpDuration, DumpHeader, DumpReader, DumpStats, DumpWriter, Frame as DumpFrame};
pub use config::Config;
pub use error::{ConfigError, DumpError, PtyError, RecordError};
pub use gateway::Gateway;
pub use pty::PtySession;
pub use record::{RecordScript, Step as RecordStep};
pub use scene::composite::CompositeScene;
pub use scene::shell::ShellScene;
pub use scene::{Scene, SceneEvent, SceneInput};
pub use snapshot::{Attrs, Color, Cursor, RichLine, Segment, Snapshot};
pub use terminal::VirtualTerminal;
