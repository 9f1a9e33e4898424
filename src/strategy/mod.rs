//! Link strategies: what artifact a matched media file becomes

pub mod copy;
pub mod link;
pub mod strm;

use crate::executor::TaskHandler;
use crate::types::{ExtensionSet, FileTask, LinkMode, TaskOutcome};

pub use copy::{copy_file_atomic, ensure_parent_dir};
pub use link::copy_or_symlink;
pub use strm::{generate_placeholder, placeholder_content, placeholder_path};

/// Task handler for the link pass
#[derive(Debug, Clone)]
pub struct LinkStrategy {
    mode: LinkMode,
    extensions: ExtensionSet,
}

impl LinkStrategy {
    /// `extensions` is the pass's media set, used to resolve placeholder collisions.
    pub fn new(mode: LinkMode, extensions: ExtensionSet) -> Self {
        Self { mode, extensions }
    }

    pub fn mode(&self) -> &LinkMode {
        &self.mode
    }
}

impl TaskHandler for LinkStrategy {
    fn handle(&self, task: &FileTask) -> TaskOutcome {
        let result = match &self.mode {
            LinkMode::CopyOrSymlink { size_threshold } => copy_or_symlink(task, *size_threshold),
            LinkMode::RemotePlaceholder { cloud } => {
                generate_placeholder(task, cloud.as_ref(), &self.extensions)
            }
        };
        result.into()
    }
}
