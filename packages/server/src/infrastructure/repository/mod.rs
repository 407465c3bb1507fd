//! Repository implementations on the shared key-value store.

mod game;
mod room;
mod ticket;

pub use game::KvGameRepository;
pub use room::KvRoomRepository;
pub use ticket::KvTicketRepository;
