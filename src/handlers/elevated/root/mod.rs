// Platform administration: churches are the tenants.

pub mod churches;

pub use churches::create as church_create;
pub use churches::delete as church_delete;
pub use churches::list as church_list;
pub use churches::restore as church_restore;
pub use churches::show as church_show;
pub use churches::update as church_update;
