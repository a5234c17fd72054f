//! Built-in format processors.

mod epub;
mod fb2;

pub use self::epub::EpubProcessor;
pub use self::fb2::Fb2Processor;
