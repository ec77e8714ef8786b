//! Renderer actor: a mailbox-driven owner of the rendering session.

mod alarm;
pub mod directory;
pub mod renderer;

pub use self::directory::RendererDirectory;
pub use self::renderer::{RenderError, RendererHandle, RendererPolicy, SessionSnapshot};
