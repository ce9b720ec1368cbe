//! The closed set of instrumented program phases.
//!
//! The enumeration mirrors the phases of the host clustering pipeline:
//! program lifecycle, sequence I/O, distance matrix, tree construction,
//! clustering iterations, alignment backends, parallel-region markers,
//! memory events, and five user-assignable slots. Kinds are fixed at build
//! time; each has a stable upper-snake name used by every output format.

/// Number of milestone kinds. Keep in sync with [`MilestoneKind::ALL`].
pub const MILESTONE_COUNT: usize = 47;

#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MilestoneKind {
    #[default]
    ProgramStart = 0,
    ProgramEnd = 1,
    OptionParsing = 2,
    Initialization = 3,
    Cleanup = 4,

    FastaLoadStart = 5,
    FastaLoadEnd = 6,
    FastaParse = 7,
    TaxonomyLoad = 8,
    OutputWrite = 9,

    DistanceMatrixStart = 10,
    DistanceMatrixEnd = 11,
    DistanceCalculation = 12,
    DistanceThreadSection = 13,
    DistanceAverageCalc = 14,

    TreeConstructionStart = 15,
    TreeConstructionEnd = 16,
    TreeNodeCreation = 17,
    TreeBranchLengthCalc = 18,

    ClusteringStart = 19,
    ClusteringEnd = 20,
    ClusteringIteration = 21,
    ClusterAssignment = 22,
    ClusterCentroidUpdate = 23,
    ClusterConvergenceCheck = 24,
    ClusterInitialization = 25,

    AlignmentStart = 26,
    AlignmentEnd = 27,
    KalignExecution = 28,
    Wfa2Execution = 29,
    NeedlemanWunsch = 30,
    SequenceAlignment = 31,
    MsaConstruction = 32,

    ParallelStart = 33,
    ParallelEnd = 34,
    ThreadSpawn = 35,
    ThreadJoin = 36,
    ThreadBarrier = 37,

    MemoryAlloc = 38,
    MemoryFree = 39,
    MemoryRealloc = 40,
    LargeAllocation = 41,

    User1 = 42,
    User2 = 43,
    User3 = 44,
    User4 = 45,
    User5 = 46,
}

/// Stable display names, indexed by discriminant.
pub const MILESTONE_NAMES: [&str; MILESTONE_COUNT] = [
    "PROGRAM_START",
    "PROGRAM_END",
    "OPTION_PARSING",
    "INITIALIZATION",
    "CLEANUP",
    "FASTA_LOAD_START",
    "FASTA_LOAD_END",
    "FASTA_PARSE",
    "TAXONOMY_LOAD",
    "OUTPUT_WRITE",
    "DISTANCE_MATRIX_START",
    "DISTANCE_MATRIX_END",
    "DISTANCE_CALCULATION",
    "DISTANCE_THREAD_SECTION",
    "DISTANCE_AVERAGE_CALC",
    "TREE_CONSTRUCTION_START",
    "TREE_CONSTRUCTION_END",
    "TREE_NODE_CREATION",
    "TREE_BRANCH_LENGTH_CALC",
    "CLUSTERING_START",
    "CLUSTERING_END",
    "CLUSTERING_ITERATION",
    "CLUSTER_ASSIGNMENT",
    "CLUSTER_CENTROID_UPDATE",
    "CLUSTER_CONVERGENCE_CHECK",
    "CLUSTER_INITIALIZATION",
    "ALIGNMENT_START",
    "ALIGNMENT_END",
    "KALIGN_EXECUTION",
    "WFA2_EXECUTION",
    "NEEDLEMAN_WUNSCH",
    "SEQUENCE_ALIGNMENT",
    "MSA_CONSTRUCTION",
    "PARALLEL_START",
    "PARALLEL_END",
    "THREAD_SPAWN",
    "THREAD_JOIN",
    "THREAD_BARRIER",
    "MEMORY_ALLOC",
    "MEMORY_FREE",
    "MEMORY_REALLOC",
    "LARGE_ALLOCATION",
    "USER_1",
    "USER_2",
    "USER_3",
    "USER_4",
    "USER_5",
];

impl MilestoneKind {
    /// Every kind, in discriminant order.
    pub const ALL: [MilestoneKind; MILESTONE_COUNT] = [
        MilestoneKind::ProgramStart,
        MilestoneKind::ProgramEnd,
        MilestoneKind::OptionParsing,
        MilestoneKind::Initialization,
        MilestoneKind::Cleanup,
        MilestoneKind::FastaLoadStart,
        MilestoneKind::FastaLoadEnd,
        MilestoneKind::FastaParse,
        MilestoneKind::TaxonomyLoad,
        MilestoneKind::OutputWrite,
        MilestoneKind::DistanceMatrixStart,
        MilestoneKind::DistanceMatrixEnd,
        MilestoneKind::DistanceCalculation,
        MilestoneKind::DistanceThreadSection,
        MilestoneKind::DistanceAverageCalc,
        MilestoneKind::TreeConstructionStart,
        MilestoneKind::TreeConstructionEnd,
        MilestoneKind::TreeNodeCreation,
        MilestoneKind::TreeBranchLengthCalc,
        MilestoneKind::ClusteringStart,
        MilestoneKind::ClusteringEnd,
        MilestoneKind::ClusteringIteration,
        MilestoneKind::ClusterAssignment,
        MilestoneKind::ClusterCentroidUpdate,
        MilestoneKind::ClusterConvergenceCheck,
        MilestoneKind::ClusterInitialization,
        MilestoneKind::AlignmentStart,
        MilestoneKind::AlignmentEnd,
        MilestoneKind::KalignExecution,
        MilestoneKind::Wfa2Execution,
        MilestoneKind::NeedlemanWunsch,
        MilestoneKind::SequenceAlignment,
        MilestoneKind::MsaConstruction,
        MilestoneKind::ParallelStart,
        MilestoneKind::ParallelEnd,
        MilestoneKind::ThreadSpawn,
        MilestoneKind::ThreadJoin,
        MilestoneKind::ThreadBarrier,
        MilestoneKind::MemoryAlloc,
        MilestoneKind::MemoryFree,
        MilestoneKind::MemoryRealloc,
        MilestoneKind::LargeAllocation,
        MilestoneKind::User1,
        MilestoneKind::User2,
        MilestoneKind::User3,
        MilestoneKind::User4,
        MilestoneKind::User5,
    ];

    /// Stable display name.
    #[inline]
    pub fn name(self) -> &'static str {
        MILESTONE_NAMES[self as usize]
    }

    /// Kind for a raw discriminant, `None` out of range.
    #[inline]
    pub fn from_u8(v: u8) -> Option<MilestoneKind> {
        MilestoneKind::ALL.get(v as usize).copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for MilestoneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_matches_discriminants() {
        for (i, kind) in MilestoneKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn from_u8_roundtrip() {
        for kind in MilestoneKind::ALL {
            assert_eq!(MilestoneKind::from_u8(kind as u8), Some(kind));
        }
        assert_eq!(MilestoneKind::from_u8(MILESTONE_COUNT as u8), None);
        assert_eq!(MilestoneKind::from_u8(255), None);
    }

    #[test]
    fn names_are_stable() {
        assert_eq!(MilestoneKind::ProgramStart.name(), "PROGRAM_START");
        assert_eq!(MilestoneKind::ClusteringIteration.name(), "CLUSTERING_ITERATION");
        assert_eq!(MilestoneKind::Wfa2Execution.name(), "WFA2_EXECUTION");
        assert_eq!(MilestoneKind::ThreadBarrier.name(), "THREAD_BARRIER");
        assert_eq!(MilestoneKind::User5.name(), "USER_5");
    }

    #[test]
    fn display_uses_name() {
        assert_eq!(MilestoneKind::KalignExecution.to_string(), "KALIGN_EXECUTION");
    }
}
