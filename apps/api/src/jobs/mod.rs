// Jobs: skill search over the company catalog and company applications.

pub mod handlers;
pub mod skills;
