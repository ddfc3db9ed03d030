mod artifact;

pub use artifact::MavenArtifact;

/// Default repository for libraries that only carry a coordinate.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
