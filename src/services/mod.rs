pub mod compression;
pub mod metrics;
pub mod plan_resolver;
pub mod quota_checker;

pub use compression::*;
pub use metrics::*;
pub use plan_resolver::*;
pub use quota_checker::*;
