pub mod activity;
pub mod attendance;
pub mod branch;
pub mod church;
pub mod content;
pub mod finance;
pub mod prayer_request;
pub mod small_group;
pub mod user;

pub use activity::Activity;
pub use attendance::Attendance;
pub use branch::Branch;
pub use church::Church;
pub use content::Content;
pub use finance::FinanceTransaction;
pub use prayer_request::PrayerRequest;
pub use small_group::SmallGroup;
pub use user::User;
