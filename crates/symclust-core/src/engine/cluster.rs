use super::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterFileError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
}

/// One row of a cluster file: a frame and the cluster it belongs to. Rows of a cluster
/// appear in member order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct MemberRecord {
    cluster: usize,
    frame: usize,
}

/// A group of mutually similar frames.
///
/// Members are kept in discovery order; the first member is the seed the cluster was
/// grown from. The center and precision are derived lazily and reset whenever the
/// membership changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    id: Option<usize>,
    members: Vec<usize>,
    center: Option<usize>,
    precision: Option<f64>,
}

impl Cluster {
    pub fn new(seed: usize) -> Self {
        Self {
            id: None,
            members: vec![seed],
            center: None,
            precision: None,
        }
    }

    /// Sequential id, assigned when the cluster set is finalized.
    pub fn id(&self) -> Option<usize> {
        self.id
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn seed(&self) -> Option<usize> {
        self.members.first().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, frame: usize) -> bool {
        self.members.contains(&frame)
    }

    pub fn center(&self) -> Option<usize> {
        self.center
    }

    pub fn precision(&self) -> Option<f64> {
        self.precision
    }

    pub(crate) fn push(&mut self, frame: usize) {
        self.members.push(frame);
        self.invalidate();
    }

    /// Moves every member of `other` to the end of this cluster, leaving `other` empty.
    pub(crate) fn absorb(&mut self, other: &mut Cluster) {
        self.members.append(&mut other.members);
        self.invalidate();
        other.invalidate();
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = Some(id);
    }

    pub(crate) fn set_center(&mut self, center: usize) {
        self.center = Some(center);
    }

    pub(crate) fn set_precision(&mut self, precision: Option<f64>) {
        self.precision = precision;
    }

    fn invalidate(&mut self) {
        self.center = None;
        self.precision = None;
    }
}

/// Ordered sequence of clusters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterSet {
    clusters: Vec<Cluster>,
}

impl ClusterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Cluster> {
        self.clusters.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cluster> {
        self.clusters.iter()
    }

    pub fn as_slice(&self) -> &[Cluster] {
        &self.clusters
    }

    /// The cluster containing `frame`, if any.
    pub fn cluster_of(&self, frame: usize) -> Option<&Cluster> {
        self.clusters.iter().find(|cluster| cluster.contains(frame))
    }

    /// Returns `true` if every index in `0..frame_count` belongs to exactly one cluster
    /// and no cluster holds anything else.
    pub fn is_partition_of(&self, frame_count: usize) -> bool {
        let mut seen = vec![false; frame_count];
        for &member in self.clusters.iter().flat_map(|cluster| cluster.members()) {
            match seen.get_mut(member) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        seen.into_iter().all(|slot| slot)
    }

    /// Builds one cluster per distinct label, ordered by label, with members in frame
    /// order. `labels[i]` is the label of frame `i`; ids are renumbered `0..M`.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::InvalidParameter`] unless there is exactly one label per
    /// frame.
    pub fn from_assignments(labels: &[usize], frame_count: usize) -> Result<Self, EngineError> {
        if labels.len() != frame_count {
            return Err(EngineError::InvalidParameter {
                name: "cluster_assignments",
                reason: format!(
                    "expected one label per frame ({frame_count}), got {}",
                    labels.len()
                ),
            });
        }

        let mut by_label: BTreeMap<usize, Cluster> = BTreeMap::new();
        for (frame, &label) in labels.iter().enumerate() {
            by_label
                .entry(label)
                .and_modify(|cluster| cluster.push(frame))
                .or_insert_with(|| Cluster::new(frame));
        }

        let mut set = Self {
            clusters: by_label.into_values().collect(),
        };
        set.finalize();
        Ok(set)
    }

    /// Writes one `cluster,frame` row per member, clusters in order.
    pub fn save_csv(&self, path: &Path) -> Result<(), ClusterFileError> {
        let path_str = path.to_string_lossy().to_string();
        let mut writer = csv::Writer::from_path(path).map_err(|e| ClusterFileError::Csv {
            path: path_str.clone(),
            source: e,
        })?;

        for (position, cluster) in self.clusters.iter().enumerate() {
            let label = cluster.id.unwrap_or(position);
            for &frame in &cluster.members {
                writer
                    .serialize(MemberRecord {
                        cluster: label,
                        frame,
                    })
                    .map_err(|e| ClusterFileError::Csv {
                        path: path_str.clone(),
                        source: e,
                    })?;
            }
        }
        writer.flush().map_err(|e| ClusterFileError::Io {
            path: path_str,
            source: e,
        })
    }

    /// Reads a file written by [`ClusterSet::save_csv`]. Clusters keep the order in which
    /// their labels first appear and members keep row order; ids are renumbered `0..M`.
    pub fn load_csv(path: &Path) -> Result<Self, ClusterFileError> {
        let path_str = path.to_string_lossy().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ClusterFileError::Csv {
                path: path_str.clone(),
                source: e,
            })?;

        let mut labels: Vec<usize> = Vec::new();
        let mut set = Self::new();
        for result in reader.deserialize::<MemberRecord>() {
            let record = result.map_err(|e| ClusterFileError::Csv {
                path: path_str.clone(),
                source: e,
            })?;
            match labels.iter().position(|&label| label == record.cluster) {
                Some(position) => set.clusters[position].push(record.frame),
                None => {
                    labels.push(record.cluster);
                    set.push(Cluster::new(record.frame));
                }
            }
        }
        set.finalize();
        Ok(set)
    }

    /// Largest member index, if any cluster has members.
    pub fn max_member(&self) -> Option<usize> {
        self.clusters
            .iter()
            .flat_map(|cluster| cluster.members.iter().copied())
            .max()
    }

    pub(crate) fn push(&mut self, cluster: Cluster) {
        self.clusters.push(cluster);
    }

    pub(crate) fn append(&mut self, other: ClusterSet) {
        self.clusters.extend(other.clusters);
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> Option<&mut Cluster> {
        self.clusters.get_mut(position)
    }

    /// Absorbs the cluster at `from` into the cluster at `into`. Returns `false` if either
    /// position is invalid or both are the same.
    pub(crate) fn merge(&mut self, into: usize, from: usize) -> bool {
        if into == from || into >= self.clusters.len() || from >= self.clusters.len() {
            return false;
        }
        let (target, source) = if into < from {
            let (head, tail) = self.clusters.split_at_mut(from);
            (&mut head[into], &mut tail[0])
        } else {
            let (head, tail) = self.clusters.split_at_mut(into);
            (&mut tail[0], &mut head[from])
        };
        target.absorb(source);
        true
    }

    pub(crate) fn drop_empty(&mut self) {
        self.clusters.retain(|cluster| !cluster.is_empty());
    }

    /// Drops empty clusters and assigns sequential ids in order.
    pub(crate) fn finalize(&mut self) {
        self.drop_empty();
        for (id, cluster) in self.clusters.iter_mut().enumerate() {
            cluster.set_id(id);
        }
    }
}

impl<'a> IntoIterator for &'a ClusterSet {
    type Item = &'a Cluster;
    type IntoIter = std::slice::Iter<'a, Cluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn set_of(groups: &[&[usize]]) -> ClusterSet {
        let mut set = ClusterSet::new();
        for group in groups {
            let mut cluster = Cluster::new(group[0]);
            for &member in &group[1..] {
                cluster.push(member);
            }
            set.push(cluster);
        }
        set
    }

    #[test]
    fn merge_appends_members_and_empties_source() {
        let mut set = set_of(&[&[0, 2], &[1], &[3, 4]]);
        set.get_mut(0).unwrap().set_center(2);

        assert!(set.merge(2, 0));

        assert_eq!(set.get(2).unwrap().members(), &[3, 4, 0, 2]);
        assert!(set.get(0).unwrap().is_empty());
        assert_eq!(set.get(0).unwrap().center(), None);
        assert!(!set.merge(1, 1));
        assert!(!set.merge(1, 7));
    }

    #[test]
    fn finalize_drops_empty_clusters_and_numbers_the_rest() {
        let mut set = set_of(&[&[0], &[1, 2], &[3]]);
        set.merge(1, 0);
        set.finalize();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0).unwrap().id(), Some(0));
        assert_eq!(set.get(0).unwrap().members(), &[1, 2, 0]);
        assert_eq!(set.get(1).unwrap().id(), Some(1));
        assert_eq!(set.cluster_of(3).unwrap().id(), Some(1));
    }

    #[test]
    fn partition_check_detects_missing_and_duplicate_members() {
        assert!(set_of(&[&[0, 2], &[1]]).is_partition_of(3));
        assert!(!set_of(&[&[0, 2], &[1]]).is_partition_of(4));
        assert!(!set_of(&[&[0, 1], &[1, 2]]).is_partition_of(3));
        assert!(!set_of(&[&[0, 5]]).is_partition_of(2));
        assert!(ClusterSet::new().is_partition_of(0));
    }

    #[test]
    fn assignments_group_frames_by_label() {
        let set = ClusterSet::from_assignments(&[7, 2, 7, 2, 4], 5).unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.get(0).unwrap().members(), &[1, 3]);
        assert_eq!(set.get(1).unwrap().members(), &[4]);
        assert_eq!(set.get(2).unwrap().members(), &[0, 2]);
        assert_eq!(set.get(2).unwrap().id(), Some(2));
        assert!(set.is_partition_of(5));
    }

    #[test]
    fn assignments_must_cover_every_frame() {
        assert!(matches!(
            ClusterSet::from_assignments(&[0, 1], 3),
            Err(EngineError::InvalidParameter {
                name: "cluster_assignments",
                ..
            })
        ));
        assert!(ClusterSet::from_assignments(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn saved_clusters_load_with_member_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusters.csv");
        let mut set = set_of(&[&[4, 0, 2], &[1], &[3]]);
        set.finalize();

        set.save_csv(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("cluster,frame\n0,4\n"));

        let loaded = ClusterSet::load_csv(&path).unwrap();
        assert_eq!(loaded, set);
        assert_eq!(loaded.max_member(), Some(4));
    }

    #[test]
    fn load_groups_rows_by_first_appearance_of_label() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusters.csv");
        fs::write(&path, "cluster,frame\n5,3\n1,0\n5,1\n").unwrap();

        let loaded = ClusterSet::load_csv(&path).unwrap();

        assert_eq!(loaded.get(0).unwrap().members(), &[3, 1]);
        assert_eq!(loaded.get(0).unwrap().id(), Some(0));
        assert_eq!(loaded.get(1).unwrap().members(), &[0]);
    }

    #[test]
    fn malformed_cluster_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        fs::write(&path, "cluster,frame\nzero,1\n").unwrap();

        let error = ClusterSet::load_csv(&path).unwrap_err();
        assert!(matches!(error, ClusterFileError::Csv { .. }));
        assert!(error.to_string().contains("broken.csv"));
    }
}
