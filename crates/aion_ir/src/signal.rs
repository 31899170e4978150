//! Signal definitions and references.
//!
//! A [`Signal`] represents a named wire, register, or latch within a module.
//! [`SignalRef`] provides a way to refer to a full signal, a bit-slice, or a concatenation.

use crate::ids::{ClockDomainId, SignalId, TypeId};
use aion_common::{Ident, LogicVec};
use aion_source::Span;
use serde::{Deserialize, Serialize};

use crate::const_value::ConstValue;

/// The kind of a signal, determining its storage semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// A combinational signal (wire/net).
    Wire,
    /// A sequential signal (flip-flop output).
    Reg,
    /// A latch output (usually a lint warning).
    Latch,
    /// A signal that backs a port.
    Port,
    /// A compile-time constant.
    Const,
}

/// A signal (wire, register, or latch) within a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// The unique ID of this signal within its module.
    pub id: SignalId,
    /// The signal name.
    pub name: Ident,
    /// The type of this signal.
    pub ty: TypeId,
    /// The storage kind (wire, reg, latch, etc.).
    pub kind: SignalKind,
    /// An optional initial/reset value.
    pub init: Option<ConstValue>,
    /// The clock domain this signal belongs to, if sequential.
    pub clock_domain: Option<ClockDomainId>,
    /// The source span where this signal was declared.
    pub span: Span,
}

/// A reference to a signal or part of a signal.
///
/// Used in connections, assignments, and expressions to refer to
/// full signals, bit-slices, concatenations, or constant values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalRef {
    /// A reference to a full signal.
    Signal(SignalId),
    /// A bit-slice of a signal.
    Slice {
        /// The signal being sliced.
        signal: SignalId,
        /// The high bit index (inclusive).
        high: u32,
        /// The low bit index (inclusive).
        low: u32,
    },
    /// A concatenation of signal references.
    Concat(Vec<SignalRef>),
    /// A constant value.
    Const(LogicVec),
}
