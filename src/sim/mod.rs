pub mod belt;
pub mod chest;
pub mod extractor;
pub mod factory;
pub mod splitter;
pub mod storage;
pub mod structure;
pub mod tick;
pub mod underground;
