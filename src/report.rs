//! Run statistics, printed by the CLI at the end of a run.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhotoCounts {
    pub unchanged: usize,
    pub updated: usize,
}

impl PhotoCounts {
    pub fn record(&mut self, updated: bool) {
        if updated {
            self.updated += 1;
        } else {
            self.unchanged += 1;
        }
    }
}

impl fmt::Display for PhotoCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} updated, {} unchanged", self.updated, self.unchanged)
    }
}

/// What happened to one album.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumActions {
    pub created: bool,
    pub added: usize,
    pub removed: usize,
    /// Changes that could not be applied (unknown album or photo).
    pub skipped: usize,
    /// Members in the album when it was sorted.
    pub sorted: Option<usize>,
}

impl fmt::Display for AlbumActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.created {
            parts.push("created".to_string());
        }
        if self.added > 0 {
            parts.push(format!("+{}", self.added));
        }
        if self.removed > 0 {
            parts.push(format!("-{}", self.removed));
        }
        if self.skipped > 0 {
            parts.push(format!("{} skipped", self.skipped));
        }
        if let Some(n) = self.sorted {
            parts.push(format!("sorted {n}"));
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub imported: Option<PhotoCounts>,
    pub exported: Option<PhotoCounts>,
    /// Photos pushed to the service.
    pub synced: Option<PhotoCounts>,
    /// Photos by whether their album memberships changed.
    pub memberships: Option<PhotoCounts>,
    pub albums: BTreeMap<String, AlbumActions>,
}

impl RunReport {
    pub fn album_mut(&mut self, title: &str) -> &mut AlbumActions {
        self.albums.entry(title.to_string()).or_default()
    }

    pub fn membership_calls(&self) -> usize {
        self.albums
            .values()
            .map(|a| a.added + a.removed + usize::from(a.created))
            .sum()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = [
            ("import", self.imported),
            ("export", self.exported),
            ("sync", self.synced),
            ("albums", self.memberships),
        ];
        for (label, value) in counts {
            if let Some(value) = value {
                writeln!(f, "{label:<8} {value}")?;
            }
        }
        for (title, actions) in &self.albums {
            writeln!(f, "  {title}: {actions}")?;
        }
        Ok(())
    }
}
