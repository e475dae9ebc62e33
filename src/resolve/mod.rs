pub mod directory;
pub mod matcher;
pub mod normalizer;

pub use directory::{is_bond, listing_source, EntityDirectory};
pub use matcher::{search, CandidateSource, NameMatch, NameResolver, ResolverConfig, SourceKind};
