use std::{io::Write, path::Path};

use derive_more::{Deref, DerefMut, From};
use glam::UVec2;
use tempfile::NamedTempFile;

use crate::error::Result;

fn stage(path: &Path, contents: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    return Ok(tmp);
}

/// Writes `contents` to a temporary file next to `path` and then renames it
/// over `path`, so a failed write never leaves a truncated output behind.
pub fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> Result<()> {
    return write_all_atomic(&[(path.as_ref(), contents)]);
}

/// Like [`write_atomic`] for outputs that belong together. Every file is
/// staged before the first one is renamed into place.
pub fn write_all_atomic(outputs: &[(&Path, &[u8])]) -> Result<()> {
    let staged = outputs
        .iter()
        .map(|&(path, contents)| stage(path, contents))
        .collect::<Result<Vec<_>>>()?;
    for (tmp, &(path, contents)) in staged.into_iter().zip(outputs) {
        tmp.persist(path)?;
        log::debug!("wrote {} bytes to {}", contents.len(), path.display());
    }
    return Ok(());
}

pub trait Area {
    type Output;
    fn area(&self) -> Self::Output;
}

impl Area for Grid {
    type Output = u32;

    fn area(&self) -> Self::Output {
        return self.x * self.y;
    }
}

/// Dimensions of a grid of cells, `x` columns by `y` rows
#[derive(Deref, DerefMut, From, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Grid(pub UVec2);

impl Grid {
    pub fn new(columns: u32, rows: u32) -> Self {
        return Self(UVec2::new(columns, rows));
    }

    /// Every cell location, row by row
    pub fn iter_locs(&self) -> UVec2Iter {
        return UVec2Iter::new(UVec2::ZERO, self.0);
    }
}

/// Row-major walk over `[start, end)`
#[derive(Clone, Debug)]
pub struct UVec2Iter {
    pub cur: UVec2,
    pub start_x: u32,
    pub end: UVec2,
}

impl UVec2Iter {
    pub fn new(start: UVec2, end: UVec2) -> Self {
        return Self {
            cur: start,
            start_x: start.x,
            end,
        };
    }
}

impl Iterator for UVec2Iter {
    type Item = UVec2;

    fn next(&mut self) -> Option<Self::Item> {
        if self.start_x >= self.end.x || self.cur.y >= self.end.y {
            return None;
        }
        let ret = self.cur;
        self.cur.x += 1;
        if self.cur.x == self.end.x {
            self.cur.x = self.start_x;
            self.cur.y += 1;
        }
        return Some(ret);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn iter_locs_is_row_major() {
        let locs: Vec<UVec2> = Grid::new(3, 2).iter_locs().collect();
        assert_eq!(locs.len() as u32, Grid::new(3, 2).area());
        assert_eq!(locs[0], UVec2::new(0, 0));
        assert_eq!(locs[1], UVec2::new(1, 0));
        assert_eq!(locs[3], UVec2::new(0, 1));
        assert_eq!(locs[5], UVec2::new(2, 1));
    }

    #[test]
    fn write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "old contents that are longer").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn grouped_write_stages_everything_first() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let missing = dir.path().join("no_such_dir").join("second.txt");
        let err = write_all_atomic(&[(first.as_path(), b"one".as_slice()), (missing.as_path(), b"two".as_slice())]);
        assert!(err.is_err());
        assert!(!first.exists());

        let second = dir.path().join("second.txt");
        write_all_atomic(&[(first.as_path(), b"one".as_slice()), (second.as_path(), b"two".as_slice())]).unwrap();
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "two");
    }

    #[test]
    fn empty_grids_yield_nothing() {
        assert_eq!(Grid::new(0, 4).iter_locs().count(), 0);
        assert_eq!(Grid::new(4, 0).iter_locs().count(), 0);
    }
}
