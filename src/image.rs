use crate::error::LoadError;
use std::path::Path;

/// An object image: a load origin and the words that go there. On disk both
/// are big-endian, origin first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub origin: u16,
    pub words: Vec<u16>,
}

impl Image {
    /// `None` if there isn't even an origin word. A dangling odd byte is
    /// dropped.
    pub fn parse(bytes: &[u8]) -> Option<Image> {
        let mut words = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        let origin = words.next()?;
        Some(Image { origin, words: words.collect() })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Image, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Image::parse(&bytes).ok_or_else(|| LoadError::Empty { path: path.to_path_buf() })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        std::iter::once(self.origin)
            .chain(self.words.iter().copied())
            .flat_map(u16::to_be_bytes)
            .collect()
    }
}
