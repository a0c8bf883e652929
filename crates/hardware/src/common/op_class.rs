//! Instruction operation classes.
//!
//! Op classes are how the decoder tells the pipeline what kind of resource an instruction
//! needs. Functional units and timing rules match on them through [`OpClassSet`]s, where an
//! empty set matches every class.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operation class of an instruction.
///
/// Names follow the op-class vocabulary used by CVA6 functional unit descriptions, so JSON
/// configurations can list classes such as `"IntAlu"` or `"SimdFloatMultAcc"` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum OpClass {
    /// Instructions with no execution cost (accepted by every unit).
    #[default]
    #[serde(rename = "No_OpClass")]
    NoOpClass,
    IntAlu,
    IntMult,
    IntDiv,
    FloatAdd,
    FloatCmp,
    FloatCvt,
    FloatMult,
    FloatMultAcc,
    FloatDiv,
    FloatMisc,
    FloatSqrt,
    SimdAdd,
    SimdAddAcc,
    SimdAlu,
    SimdCmp,
    SimdCvt,
    SimdMisc,
    SimdMult,
    SimdMultAcc,
    SimdMatMultAcc,
    SimdShift,
    SimdShiftAcc,
    SimdDiv,
    SimdSqrt,
    SimdFloatAdd,
    SimdFloatAlu,
    SimdFloatCmp,
    SimdFloatCvt,
    SimdFloatDiv,
    SimdFloatMisc,
    SimdFloatMult,
    SimdFloatMultAcc,
    SimdFloatMatMultAcc,
    SimdFloatSqrt,
    SimdReduceAdd,
    SimdReduceAlu,
    SimdReduceCmp,
    SimdFloatReduceAdd,
    SimdFloatReduceCmp,
    SimdAes,
    SimdAesMix,
    SimdSha1Hash,
    SimdSha1Hash2,
    SimdSha256Hash,
    SimdSha256Hash2,
    SimdShaSigma2,
    SimdShaSigma3,
    SimdPredAlu,
    Matrix,
    MatrixMov,
    #[serde(rename = "MatrixOP")]
    MatrixOp,
    MemRead,
    MemWrite,
    FloatMemRead,
    FloatMemWrite,
    IprAccess,
    InstPrefetch,
    VectorUnitStrideLoad,
    VectorUnitStrideStore,
    VectorUnitStrideMaskLoad,
    VectorUnitStrideMaskStore,
    VectorStridedLoad,
    VectorStridedStore,
    VectorIndexedLoad,
    VectorIndexedStore,
    VectorUnitStrideFaultOnlyFirstLoad,
    VectorWholeRegisterLoad,
    VectorWholeRegisterStore,
    VectorIntegerArith,
    VectorFloatArith,
    VectorFloatConvert,
    VectorIntegerReduce,
    VectorFloatReduce,
    VectorMisc,
    VectorIntegerExtension,
    VectorConfig,
}

/// Every floating-point, SIMD and matrix class, in the order the default float/SIMD unit lists them.
pub const FLOAT_SIMD_CLASSES: &[OpClass] = &[
    OpClass::FloatAdd,
    OpClass::FloatCmp,
    OpClass::FloatCvt,
    OpClass::FloatMisc,
    OpClass::FloatMult,
    OpClass::FloatMultAcc,
    OpClass::FloatDiv,
    OpClass::FloatSqrt,
    OpClass::SimdAdd,
    OpClass::SimdAddAcc,
    OpClass::SimdAlu,
    OpClass::SimdCmp,
    OpClass::SimdCvt,
    OpClass::SimdMisc,
    OpClass::SimdMult,
    OpClass::SimdMultAcc,
    OpClass::SimdMatMultAcc,
    OpClass::SimdShift,
    OpClass::SimdShiftAcc,
    OpClass::SimdDiv,
    OpClass::SimdSqrt,
    OpClass::SimdFloatAdd,
    OpClass::SimdFloatAlu,
    OpClass::SimdFloatCmp,
    OpClass::SimdFloatCvt,
    OpClass::SimdFloatDiv,
    OpClass::SimdFloatMisc,
    OpClass::SimdFloatMult,
    OpClass::SimdFloatMultAcc,
    OpClass::SimdFloatMatMultAcc,
    OpClass::SimdFloatSqrt,
    OpClass::SimdReduceAdd,
    OpClass::SimdReduceAlu,
    OpClass::SimdReduceCmp,
    OpClass::SimdFloatReduceAdd,
    OpClass::SimdFloatReduceCmp,
    OpClass::SimdAes,
    OpClass::SimdAesMix,
    OpClass::SimdSha1Hash,
    OpClass::SimdSha1Hash2,
    OpClass::SimdSha256Hash,
    OpClass::SimdSha256Hash2,
    OpClass::SimdShaSigma2,
    OpClass::SimdShaSigma3,
    OpClass::Matrix,
    OpClass::MatrixMov,
    OpClass::MatrixOp,
];

/// Every vector class.
pub const VECTOR_CLASSES: &[OpClass] = &[
    OpClass::VectorUnitStrideLoad,
    OpClass::VectorUnitStrideStore,
    OpClass::VectorUnitStrideMaskLoad,
    OpClass::VectorUnitStrideMaskStore,
    OpClass::VectorStridedLoad,
    OpClass::VectorStridedStore,
    OpClass::VectorIndexedLoad,
    OpClass::VectorIndexedStore,
    OpClass::VectorUnitStrideFaultOnlyFirstLoad,
    OpClass::VectorWholeRegisterLoad,
    OpClass::VectorWholeRegisterStore,
    OpClass::VectorIntegerArith,
    OpClass::VectorFloatArith,
    OpClass::VectorFloatConvert,
    OpClass::VectorIntegerReduce,
    OpClass::VectorFloatReduce,
    OpClass::VectorMisc,
    OpClass::VectorIntegerExtension,
    OpClass::VectorConfig,
];

impl OpClass {
    /// True for integer ALU, multiply and divide classes.
    pub const fn is_int(self) -> bool {
        matches!(self, Self::IntAlu | Self::IntMult | Self::IntDiv)
    }

    /// True for scalar floating-point classes, including FP memory references.
    pub const fn is_float(self) -> bool {
        matches!(
            self,
            Self::FloatAdd
                | Self::FloatCmp
                | Self::FloatCvt
                | Self::FloatMult
                | Self::FloatMultAcc
                | Self::FloatDiv
                | Self::FloatMisc
                | Self::FloatSqrt
                | Self::FloatMemRead
                | Self::FloatMemWrite
        )
    }

    /// True for SIMD, matrix and vector classes.
    pub fn is_vector(self) -> bool {
        (FLOAT_SIMD_CLASSES.contains(&self) && !self.is_float())
            || VECTOR_CLASSES.contains(&self)
            || self == Self::SimdPredAlu
    }

    /// True for scalar memory reference classes.
    pub const fn is_mem(self) -> bool {
        matches!(
            self,
            Self::MemRead | Self::MemWrite | Self::FloatMemRead | Self::FloatMemWrite
        )
    }
}

impl fmt::Display for OpClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOpClass => f.write_str("No_OpClass"),
            Self::MatrixOp => f.write_str("MatrixOP"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// An ordered set of op classes. The empty set matches every class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpClassSet(Vec<OpClass>);

impl OpClassSet {
    /// The wildcard set, matching every class.
    pub const fn any() -> Self {
        Self(Vec::new())
    }

    /// A set holding exactly the given classes.
    pub fn of(classes: &[OpClass]) -> Self {
        Self(classes.to_vec())
    }

    /// Returns whether `op` is a member (always true for the wildcard set).
    pub fn provides(&self, op: OpClass) -> bool {
        self.0.is_empty() || self.0.contains(&op)
    }

    /// Returns whether this is the wildcard set.
    pub fn is_wildcard(&self) -> bool {
        self.0.is_empty()
    }

    /// The listed classes, in declaration order.
    pub fn classes(&self) -> &[OpClass] {
        &self.0
    }
}

impl From<Vec<OpClass>> for OpClassSet {
    fn from(classes: Vec<OpClass>) -> Self {
        Self(classes)
    }
}
