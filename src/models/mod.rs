pub mod compression;
pub mod decision;
pub mod quota_level;
pub mod quota_record;

pub use compression::*;
pub use decision::*;
pub use quota_level::*;
pub use quota_record::*;
