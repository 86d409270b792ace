//! Derived datatype registry shared by every rank of a local world.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::datatype::{Combiner, Contents, Envelope};
use crate::error::{BigCountError, Result};
use crate::types::{Aint, DataType};

/// Datatype handle of the local transport.
///
/// `0` is the null datatype, `1..=12` the predefined types, anything larger
/// a derived type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalDatatype(u32);

const FIRST_DERIVED: u32 = DataType::ALL.len() as u32 + 1;

impl LocalDatatype {
    pub const NULL: LocalDatatype = LocalDatatype(0);

    pub fn predefined(dtype: DataType) -> Self {
        Self(dtype as u32 + 1)
    }

    pub fn as_predefined(self) -> Option<DataType> {
        match self.0 {
            0 => None,
            id if id < FIRST_DERIVED => DataType::from_repr((id - 1) as u8),
            _ => None,
        }
    }

    pub fn is_derived(self) -> bool {
        self.0 >= FIRST_DERIVED
    }
}

impl std::fmt::Display for LocalDatatype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_predefined() {
            Some(dt) => write!(f, "{dt}"),
            None if self.0 == 0 => f.write_str("null"),
            None => write!(f, "dt#{}", self.0),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum TypeNode {
    Contiguous {
        count: i32,
        oldtype: LocalDatatype,
    },
    Vector {
        count: i32,
        blocklength: i32,
        stride: i32,
        oldtype: LocalDatatype,
    },
    Struct {
        blocklengths: Vec<i32>,
        displacements: Vec<Aint>,
        types: Vec<LocalDatatype>,
    },
}

impl TypeNode {
    fn children(&self) -> Vec<LocalDatatype> {
        match self {
            TypeNode::Contiguous { oldtype, .. } | TypeNode::Vector { oldtype, .. } => {
                vec![*oldtype]
            }
            TypeNode::Struct { types, .. } => types.clone(),
        }
    }
}

struct TypeEntry {
    node: TypeNode,
    committed: bool,
    /// Released by its creator; kept alive while referenced by a parent.
    freed: bool,
    refs: usize,
}

/// Flattened memory map of one datatype instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layout {
    /// `(byte offset, length)` runs in type-map order, adjacent runs merged.
    pub segments: Vec<(Aint, usize)>,
    /// Bytes of data per instance.
    pub size: usize,
    pub lb: Aint,
    pub extent: Aint,
    /// The single predefined element type, when the map has one.
    pub basic: Option<DataType>,
}

impl Layout {
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            size: 0,
            lb: 0,
            extent: 0,
            basic: None,
        }
    }

    fn named(dtype: DataType) -> Self {
        let size = dtype.size_in_bytes();
        Self {
            segments: vec![(0, size)],
            size,
            lb: 0,
            extent: size as Aint,
            basic: Some(dtype),
        }
    }

    /// One instance occupies exactly `[lb, lb + extent)` with no gaps.
    pub fn is_dense(&self) -> bool {
        matches!(self.segments[..], [(off, len)] if off == self.lb && len as Aint == self.extent)
    }
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<u32, TypeEntry>,
    next_id: u32,
}

pub(crate) struct TypeRegistry {
    inner: Mutex<RegistryInner>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                entries: HashMap::new(),
                next_id: FIRST_DERIVED,
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RegistryInner>> {
        self.inner
            .lock()
            .map_err(|_| BigCountError::LockPoisoned("datatype registry"))
    }

    pub fn create(&self, node: TypeNode) -> Result<LocalDatatype> {
        let mut inner = self.lock()?;
        for child in node.children() {
            if child.is_derived() {
                match inner.entries.get(&child.0) {
                    Some(entry) if !entry.freed => {}
                    _ => return Err(BigCountError::UnknownHandle(child.to_string())),
                }
            } else if child.as_predefined().is_none() {
                return Err(BigCountError::UnknownHandle(child.to_string()));
            }
        }
        for child in node.children() {
            if let Some(entry) = inner.entries.get_mut(&child.0) {
                entry.refs += 1;
            }
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.insert(
            id,
            TypeEntry {
                node,
                committed: false,
                freed: false,
                refs: 0,
            },
        );
        Ok(LocalDatatype(id))
    }

    pub fn commit(&self, handle: LocalDatatype) -> Result<()> {
        if handle.as_predefined().is_some() {
            return Ok(());
        }
        let mut inner = self.lock()?;
        match inner.entries.get_mut(&handle.0) {
            Some(entry) if !entry.freed => {
                entry.committed = true;
                Ok(())
            }
            _ => Err(BigCountError::UnknownHandle(handle.to_string())),
        }
    }

    pub fn free(&self, handle: LocalDatatype) -> Result<()> {
        let mut inner = self.lock()?;
        let entry = match inner.entries.get_mut(&handle.0) {
            Some(entry) if handle.is_derived() && !entry.freed => entry,
            _ => return Err(BigCountError::UnknownHandle(handle.to_string())),
        };
        entry.freed = true;
        if entry.refs == 0 {
            inner.collect(handle.0);
        }
        Ok(())
    }

    pub fn live(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }

    pub fn envelope(&self, handle: LocalDatatype) -> Result<Envelope> {
        if handle.as_predefined().is_some() {
            return Ok(Envelope::named());
        }
        let inner = self.lock()?;
        let env = match &inner.node(handle)? {
            TypeNode::Contiguous { .. } => Envelope {
                num_integers: 1,
                num_addresses: 0,
                num_datatypes: 1,
                combiner: Combiner::Contiguous,
            },
            TypeNode::Vector { .. } => Envelope {
                num_integers: 3,
                num_addresses: 0,
                num_datatypes: 1,
                combiner: Combiner::Vector,
            },
            TypeNode::Struct { types, .. } => Envelope {
                num_integers: types.len() + 1,
                num_addresses: types.len(),
                num_datatypes: types.len(),
                combiner: Combiner::Struct,
            },
        };
        Ok(env)
    }

    pub fn contents(&self, handle: LocalDatatype) -> Result<Contents<LocalDatatype>> {
        let inner = self.lock()?;
        let contents = match inner.node(handle)? {
            TypeNode::Contiguous { count, oldtype } => Contents {
                integers: vec![*count],
                addresses: Vec::new(),
                datatypes: vec![*oldtype],
            },
            TypeNode::Vector {
                count,
                blocklength,
                stride,
                oldtype,
            } => Contents {
                integers: vec![*count, *blocklength, *stride],
                addresses: Vec::new(),
                datatypes: vec![*oldtype],
            },
            TypeNode::Struct {
                blocklengths,
                displacements,
                types,
            } => {
                let mut integers = Vec::with_capacity(blocklengths.len() + 1);
                integers.push(blocklengths.len() as i32);
                integers.extend_from_slice(blocklengths);
                Contents {
                    integers,
                    addresses: displacements.clone(),
                    datatypes: types.clone(),
                }
            }
        };
        Ok(contents)
    }

    /// `(lb, extent)` of a datatype.
    pub fn extent(&self, handle: LocalDatatype) -> Result<(Aint, Aint)> {
        let inner = self.lock()?;
        let (lb, ub) = inner.bounds(handle)?;
        Ok((lb, ub - lb))
    }

    /// Memory map for communication; derived types must be committed.
    pub fn layout(&self, handle: LocalDatatype) -> Result<Layout> {
        if let Some(dt) = handle.as_predefined() {
            return Ok(Layout::named(dt));
        }
        let inner = self.lock()?;
        match inner.entries.get(&handle.0) {
            Some(entry) if entry.freed => {
                return Err(BigCountError::UnknownHandle(handle.to_string()));
            }
            Some(entry) if !entry.committed => {
                return Err(BigCountError::TypeNotCommitted(handle.to_string()));
            }
            Some(_) => {}
            None => return Err(BigCountError::UnknownHandle(handle.to_string())),
        }
        inner.layout(handle)
    }
}

impl RegistryInner {
    fn node(&self, handle: LocalDatatype) -> Result<&TypeNode> {
        self.entries
            .get(&handle.0)
            .map(|e| &e.node)
            .ok_or_else(|| BigCountError::UnknownHandle(handle.to_string()))
    }

    /// Remove a freed, unreferenced entry and release its children.
    fn collect(&mut self, id: u32) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(entry) = self.entries.remove(&id) else {
                continue;
            };
            for child in entry.node.children() {
                if let Some(c) = self.entries.get_mut(&child.0) {
                    c.refs -= 1;
                    if c.freed && c.refs == 0 {
                        pending.push(child.0);
                    }
                }
            }
        }
    }

    /// `(lb, ub)` in bytes.
    fn bounds(&self, handle: LocalDatatype) -> Result<(Aint, Aint)> {
        if let Some(dt) = handle.as_predefined() {
            return Ok((0, dt.size_in_bytes() as Aint));
        }
        match self.node(handle)? {
            TypeNode::Contiguous { count, oldtype } => self.run_bounds(*oldtype, 0, *count),
            TypeNode::Vector {
                count,
                blocklength,
                stride,
                oldtype,
            } => {
                if *count == 0 || *blocklength == 0 {
                    return Ok((0, 0));
                }
                let (lb, ub) = self.bounds(*oldtype)?;
                let ext = ub - lb;
                let last = mul(mul(Aint::from(*count - 1), Aint::from(*stride))?, ext)?;
                let tail = mul(Aint::from(*blocklength - 1), ext)?;
                Ok((last.min(0) + lb, add(last.max(0), add(tail, ub)?)?))
            }
            TypeNode::Struct {
                blocklengths,
                displacements,
                types,
            } => {
                let mut bounds: Option<(Aint, Aint)> = None;
                for ((bl, disp), ty) in blocklengths.iter().zip(displacements).zip(types) {
                    if *bl == 0 {
                        continue;
                    }
                    let (lb, ub) = self.run_bounds(*ty, *disp, *bl)?;
                    bounds = Some(match bounds {
                        Some((l, u)) => (l.min(lb), u.max(ub)),
                        None => (lb, ub),
                    });
                }
                Ok(bounds.unwrap_or((0, 0)))
            }
        }
    }

    /// Bounds of `n` consecutive instances of `handle` starting at `base`.
    fn run_bounds(&self, handle: LocalDatatype, base: Aint, n: i32) -> Result<(Aint, Aint)> {
        if n == 0 {
            return Ok((base, base));
        }
        let (lb, ub) = self.bounds(handle)?;
        let span = mul(Aint::from(n - 1), ub - lb)?;
        Ok((add(base, lb)?, add(add(base, span)?, ub)?))
    }

    fn layout(&self, handle: LocalDatatype) -> Result<Layout> {
        if let Some(dt) = handle.as_predefined() {
            return Ok(Layout::named(dt));
        }
        let (lb, ub) = self.bounds(handle)?;
        let mut segments = Vec::new();
        self.flatten(handle, 0, &mut segments)?;
        Ok(Layout {
            size: segments.iter().map(|(_, len)| len).sum(),
            segments,
            lb,
            extent: ub - lb,
            basic: self.basic(handle)?,
        })
    }

    fn flatten(&self, handle: LocalDatatype, base: Aint, out: &mut Vec<(Aint, usize)>) -> Result<()> {
        if let Some(dt) = handle.as_predefined() {
            push_segment(out, base, dt.size_in_bytes());
            return Ok(());
        }
        match self.node(handle)? {
            TypeNode::Contiguous { count, oldtype } => self.flatten_run(*oldtype, base, *count, out),
            TypeNode::Vector {
                count,
                blocklength,
                stride,
                oldtype,
            } => {
                let (lb, ub) = self.bounds(*oldtype)?;
                let step = mul(Aint::from(*stride), ub - lb)?;
                for j in 0..*count {
                    let start = add(base, mul(Aint::from(j), step)?)?;
                    self.flatten_run(*oldtype, start, *blocklength, out)?;
                }
                Ok(())
            }
            TypeNode::Struct {
                blocklengths,
                displacements,
                types,
            } => {
                for ((bl, disp), ty) in blocklengths.iter().zip(displacements).zip(types) {
                    self.flatten_run(*ty, add(base, *disp)?, *bl, out)?;
                }
                Ok(())
            }
        }
    }

    /// Flatten `n` consecutive instances, as a single run when the type is dense.
    fn flatten_run(
        &self,
        handle: LocalDatatype,
        base: Aint,
        n: i32,
        out: &mut Vec<(Aint, usize)>,
    ) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let layout = self.layout(handle)?;
        if layout.is_dense() {
            let len = usize::try_from(mul(layout.extent, Aint::from(n))?)
                .map_err(|_| BigCountError::Overflow("segment length"))?;
            push_segment(out, add(base, layout.lb)?, len);
            return Ok(());
        }
        for k in 0..n {
            let start = add(base, mul(Aint::from(k), layout.extent)?)?;
            for (off, len) in &layout.segments {
                push_segment(out, add(start, *off)?, *len);
            }
        }
        Ok(())
    }

    fn basic(&self, handle: LocalDatatype) -> Result<Option<DataType>> {
        if let Some(dt) = handle.as_predefined() {
            return Ok(Some(dt));
        }
        match self.node(handle)? {
            TypeNode::Contiguous { oldtype, .. } | TypeNode::Vector { oldtype, .. } => {
                self.basic(*oldtype)
            }
            TypeNode::Struct { types, .. } => {
                let mut basic = None;
                for ty in types {
                    match (basic, self.basic(*ty)?) {
                        (_, None) => return Ok(None),
                        (None, found) => basic = found,
                        (Some(a), Some(b)) if a != b => return Ok(None),
                        _ => {}
                    }
                }
                Ok(basic)
            }
        }
    }
}

fn push_segment(out: &mut Vec<(Aint, usize)>, off: Aint, len: usize) {
    if len == 0 {
        return;
    }
    if let Some(last) = out.last_mut()
        && last.0 + last.1 as Aint == off
    {
        last.1 += len;
        return;
    }
    out.push((off, len));
}

fn mul(a: Aint, b: Aint) -> Result<Aint> {
    a.checked_mul(b).ok_or(BigCountError::Overflow("datatype extent"))
}

fn add(a: Aint, b: Aint) -> Result<Aint> {
    a.checked_add(b).ok_or(BigCountError::Overflow("datatype extent"))
}
