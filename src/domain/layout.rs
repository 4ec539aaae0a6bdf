//! Storage slot arithmetic for struct packing.

use super::ast::{EnumDef, StructDef, TypeName};

pub const SLOT_BYTES: u32 = 32;

/// Bytes a value of `ty` occupies when packed, or `None` when it always takes
/// whole slots of its own (dynamic, composite and unknown types).
pub fn byte_width(ty: &TypeName, enums: &[EnumDef]) -> Option<u32> {
    match ty {
        TypeName::Elementary(name) => elementary_width(name),
        TypeName::UserDefined(name) => {
            let last = name.rsplit('.').next().unwrap_or(name);
            enums.iter().any(|e| e.name == last).then_some(1)
        }
        TypeName::Mapping { .. } | TypeName::Array { .. } | TypeName::Function { .. } => None,
    }
}

fn elementary_width(name: &str) -> Option<u32> {
    match name {
        "bool" | "byte" => return Some(1),
        "address" | "address payable" => return Some(20),
        "uint" | "int" => return Some(SLOT_BYTES),
        "fixed" | "ufixed" => return Some(16),
        "string" | "bytes" => return None,
        _ => {}
    }
    if let Some(bits) = name.strip_prefix("uint").or_else(|| name.strip_prefix("int")) {
        return bits.parse::<u32>().ok().map(|b| b / 8);
    }
    if let Some(bytes) = name.strip_prefix("bytes") {
        return bytes.parse::<u32>().ok();
    }
    if let Some(spec) = name.strip_prefix("ufixed").or_else(|| name.strip_prefix("fixed")) {
        let bits = spec.split('x').next()?;
        return bits.parse::<u32>().ok().map(|b| b / 8);
    }
    None
}

/// A maximal stretch of consecutive fields narrower than a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedRun {
    /// Field indices, in declaration order.
    pub fields: Vec<usize>,
    pub bytes: u32,
}

impl PackedRun {
    pub fn fits_one_slot(&self) -> bool {
        self.bytes <= SLOT_BYTES
    }

    pub fn shares_slot(&self) -> bool {
        self.fields.len() >= 2
    }
}

/// Splits field widths into runs of sub-slot fields; whole-slot fields end a run.
pub fn packed_runs(widths: &[Option<u32>]) -> Vec<PackedRun> {
    let mut runs = Vec::new();
    let mut current = PackedRun { fields: Vec::new(), bytes: 0 };
    for (index, width) in widths.iter().enumerate() {
        match width {
            Some(w) if *w < SLOT_BYTES => {
                current.fields.push(index);
                current.bytes += w;
            }
            _ => {
                if !current.fields.is_empty() {
                    runs.push(std::mem::replace(
                        &mut current,
                        PackedRun { fields: Vec::new(), bytes: 0 },
                    ));
                }
            }
        }
    }
    if !current.fields.is_empty() {
        runs.push(current);
    }
    runs
}

/// Packing assessment of one struct.
#[derive(Debug, Clone)]
pub struct StructPacking<'a> {
    pub def: &'a StructDef,
    pub runs: Vec<PackedRun>,
}

impl<'a> StructPacking<'a> {
    pub fn of(def: &'a StructDef, enums: &[EnumDef]) -> Self {
        let widths: Vec<Option<u32>> = def
            .fields
            .iter()
            .map(|f| byte_width(&f.type_name, enums))
            .collect();
        Self { def, runs: packed_runs(&widths) }
    }

    /// Every run fits its slot and at least one slot is shared.
    pub fn is_tight(&self) -> bool {
        self.runs.iter().all(PackedRun::fits_one_slot)
            && self.runs.iter().any(PackedRun::shares_slot)
    }

    /// The first run that spills past a slot boundary, if any.
    pub fn overflowing_run(&self) -> Option<&PackedRun> {
        self.runs.iter().find(|r| !r.fits_one_slot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::StructField;

    fn elementary(name: &str) -> TypeName {
        TypeName::Elementary(name.to_string())
    }

    fn strukt(types: &[&str]) -> StructDef {
        StructDef {
            name: "S".to_string(),
            fields: types
                .iter()
                .enumerate()
                .map(|(i, t)| StructField {
                    name: format!("f{i}"),
                    type_name: elementary(t),
                    line: i + 1,
                })
                .collect(),
            line: 1,
        }
    }

    #[test]
    fn test_elementary_widths() {
        assert_eq!(byte_width(&elementary("uint8"), &[]), Some(1));
        assert_eq!(byte_width(&elementary("bytes1"), &[]), Some(1));
        assert_eq!(byte_width(&elementary("address"), &[]), Some(20));
        assert_eq!(byte_width(&elementary("uint256"), &[]), Some(32));
        assert_eq!(byte_width(&elementary("uint"), &[]), Some(32));
        assert_eq!(byte_width(&elementary("int128"), &[]), Some(16));
        assert_eq!(byte_width(&elementary("ufixed64x10"), &[]), Some(8));
        assert_eq!(byte_width(&elementary("string"), &[]), None);
    }

    #[test]
    fn test_enum_field_is_one_byte() {
        let enums = vec![EnumDef { name: "State".to_string(), members: vec![], line: 1 }];
        let ty = TypeName::UserDefined("State".to_string());
        assert_eq!(byte_width(&ty, &enums), Some(1));
        assert_eq!(byte_width(&TypeName::UserDefined("Token".to_string()), &enums), None);
    }

    #[test]
    fn test_eight_single_bytes_pack_tightly() {
        let def =
            strukt(&["uint8", "uint8", "uint8", "uint8", "bytes1", "bytes1", "bytes1", "bytes1"]);
        let packing = StructPacking::of(&def, &[]);
        assert_eq!(packing.runs.len(), 1);
        assert_eq!(packing.runs[0].bytes, 8);
        assert!(packing.is_tight());
    }

    #[test]
    fn test_stranded_field_is_not_tight() {
        let def = strukt(&["uint256", "uint8", "uint256"]);
        let packing = StructPacking::of(&def, &[]);
        assert_eq!(packing.runs, vec![PackedRun { fields: vec![1], bytes: 1 }]);
        assert!(!packing.is_tight());
    }

    #[test]
    fn test_run_crossing_a_slot_is_not_tight() {
        let def = strukt(&["uint128", "uint64", "uint128"]);
        let packing = StructPacking::of(&def, &[]);
        assert_eq!(packing.overflowing_run().map(|r| r.bytes), Some(40));
        assert!(!packing.is_tight());
    }
}
