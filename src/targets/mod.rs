pub mod dictionary;
pub mod hosts;
pub mod ports;

pub use dictionary::{DictionaryKind, DictionarySource, FileDictionaries};
pub use hosts::TargetSet;
pub use ports::PortSet;
