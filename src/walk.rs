//! Lazy depth-first directory traversal over any [`Location`].

use std::cmp::Ordering;

use crate::{FsError, Location};

/// One step of a walk: the directory, its subdirectories and its other entries.
pub type WalkStep<L> = (L, Vec<L>, Vec<L>);

struct Frame<L> {
    dir: L,
    subdirs: Vec<L>,
    files: Vec<L>,
    next: usize,
}

/// Iterator over a directory tree, created by
/// [`LocationExt::walk`](crate::LocationExt::walk).
///
/// Top-down walks yield a directory before its subdirectories; bottom-up
/// walks yield it after. Symbolic links to directories are listed but never
/// descended into. An unreadable directory yields its error and the walk
/// carries on with its siblings.
///
/// # Pruning
///
/// In a top-down walk, the subdirectory list of the step just yielded can be
/// edited through [`subdirs_mut`](Walk::subdirs_mut) before the next call;
/// the walk descends into whatever the list holds at that point. Entries that
/// are not children of the yielded directory fail with
/// [`FsError::InsecurePath`].
///
/// ```rust
/// use anyfs_path::{Location, LocationExt, MemoryFs};
///
/// let root = MemoryFs::new().root();
/// root.join("keep/deep").unwrap().mkdir(false, true).unwrap();
/// root.join("skip/deep").unwrap().mkdir(false, true).unwrap();
///
/// let mut walk = root.walk(true);
/// let mut seen = Vec::new();
/// while let Some(step) = walk.next() {
///     let (dir, _, _) = step.unwrap();
///     seen.push(dir.to_string());
///     if let Some(subdirs) = walk.subdirs_mut() {
///         subdirs.retain(|d| d.name() != "skip");
///     }
/// }
/// assert_eq!(seen, ["/", "/keep", "/keep/deep"]);
/// ```
pub struct Walk<L: Location> {
    topdown: bool,
    start: Option<L>,
    stack: Vec<Frame<L>>,
}

impl<L: Location> Walk<L> {
    pub(crate) fn new(top: L, topdown: bool) -> Self {
        Self {
            topdown,
            start: Some(top),
            stack: Vec::new(),
        }
    }

    /// The subdirectory list of the directory just yielded, in a top-down walk.
    pub fn subdirs_mut(&mut self) -> Option<&mut Vec<L>> {
        if !self.topdown {
            return None;
        }
        self.stack.last_mut().map(|frame| &mut frame.subdirs)
    }

    fn list(dir: L) -> Result<Frame<L>, FsError> {
        let mut entries = dir.read_dir()?;
        entries.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let mut subdirs = Vec::new();
        let mut files = Vec::new();
        for entry in entries {
            if entry.is_dir()? {
                subdirs.push(entry);
            } else {
                files.push(entry);
            }
        }
        Ok(Frame {
            dir,
            subdirs,
            files,
            next: 0,
        })
    }

    fn step(frame: &Frame<L>) -> WalkStep<L> {
        (
            frame.dir.clone(),
            frame.subdirs.clone(),
            frame.files.clone(),
        )
    }

    /// The next subdirectory of the top frame to descend into, if any.
    fn next_subdir(&mut self) -> Option<Result<L, FsError>> {
        let frame = self.stack.last_mut()?;
        while frame.next < frame.subdirs.len() {
            let candidate = frame.subdirs[frame.next].clone();
            frame.next += 1;
            if candidate.parent() != frame.dir || candidate == frame.dir {
                return Some(Err(FsError::insecure(
                    candidate.to_string(),
                    "walk is only allowed into subdirs",
                )));
            }
            match candidate.is_link() {
                Ok(true) => continue,
                Ok(false) => return Some(Ok(candidate)),
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

impl<L: Location> Iterator for Walk<L> {
    type Item = Result<WalkStep<L>, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(top) = self.start.take() {
            match Self::list(top) {
                Ok(frame) => {
                    let step = Self::step(&frame);
                    self.stack.push(frame);
                    if self.topdown {
                        return Some(Ok(step));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }

        while !self.stack.is_empty() {
            match self.next_subdir() {
                Some(Ok(dir)) => match Self::list(dir) {
                    Ok(frame) => {
                        let step = Self::step(&frame);
                        self.stack.push(frame);
                        if self.topdown {
                            return Some(Ok(step));
                        }
                    }
                    Err(e) => return Some(Err(e)),
                },
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    let frame = self.stack.pop()?;
                    if !self.topdown {
                        return Some(Ok(Self::step(&frame)));
                    }
                }
            }
        }
        None
    }
}
