mod ids;
mod query;
mod track;

pub use ids::{AlbumId, ArtistId, TrackId};
pub use query::{GroupType, Query};
pub use track::{Track, TrackFlags};
