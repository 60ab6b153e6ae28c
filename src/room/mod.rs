mod background;
mod phonetic;
mod repository;
mod room;
mod site;

pub use background::{shutdown, spawn_flush_loop, spawn_ttl_purge_loop};
pub use phonetic::generate_phonetic_name;
pub use repository::RoomRepository;
pub use room::{Room, RoomLimits, UTIL_SITE_ID};
pub use site::{Site, SiteReceiver};
