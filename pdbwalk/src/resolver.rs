//! The address/name resolver.
//!
//! Joins the global symbol stream, the per-module symbol streams, the PE
//! section table, and the OMAP remap table into two queries:
//! `rva -> name` and `name -> (type, rva)`.
//!
//! The bulk `rva -> name` table is built on first use. Records naming an
//! out-of-range section are skipped with a warning during the bulk build;
//! they fail with [`Error::BadSectionIndex`] when queried directly.

use crate::error::{Error, Result};
use crate::syms::DataSym;
use crate::tpi::Ty;
use crate::types::primitive::primitive_type;
use crate::types::TypeIndex;
use crate::Pdb;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// The lazily built `rva -> name` table.
#[derive(Default)]
pub(crate) struct AddressMap {
    rva_to_name: HashMap<u32, String>,
}

impl Pdb {
    /// Maps a `(section, offset)` pair to an image RVA, applying the OMAP
    /// remap when one is present.
    ///
    /// Section indexes are 1-based; 0 and out-of-range values fail with
    /// [`Error::BadSectionIndex`].
    pub fn remap_address(&self, section: u16, offset: u32) -> Result<u32> {
        let header = self
            .remap_sections
            .get((section as usize).wrapping_sub(1))
            .ok_or(Error::BadSectionIndex(section))?;
        Ok(self
            .remap
            .remap(header.virtual_address.get().wrapping_add(offset)))
    }

    fn address_map(&self) -> &AddressMap {
        self.address_map.get_or_init(|| self.build_address_map())
    }

    fn build_address_map(&self) -> AddressMap {
        let mut map = AddressMap::default();

        let add = |map: &mut AddressMap, section: u16, offset: u32, name: &str| {
            match self.remap_address(section, offset) {
                // Last writer wins on RVA collisions.
                Ok(rva) => {
                    map.rva_to_name.insert(rva, name.to_string());
                }
                Err(e) => warn!(name, %e, "skipping symbol in address map"),
            }
        };

        for sym in self.globals.data.values().chain(self.globals.threads.values()) {
            add(&mut map, sym.section, sym.offset, &sym.name);
        }

        // Every module referenced by a procref contributes all of its
        // addressable symbols.
        let referenced: BTreeSet<u16> = self
            .globals
            .procrefs
            .values()
            .map(|r| r.module_index)
            .collect();

        for module_index in referenced {
            let Some(module) = self.module_symbols(module_index) else {
                warn!(module_index, "procref names a module with no symbol stream");
                continue;
            };

            for proc in &module.procs {
                add(&mut map, proc.section, proc.offset, &proc.name);
            }
            for data in &module.data {
                add(&mut map, data.section, data.offset, &data.name);
            }
        }

        map
    }

    /// The parsed symbols of a module, by 1-based module index.
    fn module_symbols(&self, module_index: u16) -> Option<&crate::modi::ModuleSymbols> {
        let index = (module_index as usize).checked_sub(1)?;
        self.module_syms.get(index)?.as_ref()
    }

    /// Finds the symbol name at an image RVA, if any symbol maps exactly to
    /// that address.
    pub fn name_at(&self, rva: u32) -> Option<&str> {
        self.address_map()
            .rva_to_name
            .get(&rva)
            .map(String::as_str)
    }

    /// Resolves a name to a `(type, rva)` pair.
    ///
    /// Sources are tried in order: global data, procedure references (through
    /// the referenced module's symbols), UDTs (type only), and finally the
    /// type graph by name (type only). The first success wins.
    pub fn resolve(&self, name: &str) -> Result<(Ty<'_>, u32)> {
        if let Some(data) = self.globals.data.get(name) {
            if let Ok(rva) = self.remap_address(data.section, data.offset) {
                return Ok((self.type_of_sym(data), rva));
            }
        }

        if let Some(proc_ref) = self.globals.procrefs.get(name) {
            if let Some(module) = self.module_symbols(proc_ref.module_index) {
                if let Some(proc) = module.proc_by_name(name) {
                    if let Ok(rva) = self.remap_address(proc.section, proc.offset) {
                        let ty = self
                            .graph
                            .get(proc.type_index)
                            .unwrap_or_else(|_| no_type());
                        return Ok((ty, rva));
                    }
                }
            }
        }

        // A UDT's type index may point at a forward reference that resolution
        // dropped; the name lookup below still finds the definition.
        if let Some(udt) = self.globals.udts.get(name) {
            if let Ok(ty) = self.graph.get(udt.type_index) {
                return Ok((ty, 0));
            }
        }

        if let Ok(ty) = self.graph.get_by_name(name) {
            return Ok((ty, 0));
        }

        Err(Error::UnknownSymbol(name.to_string()))
    }

    /// The type of a data symbol, degrading to `T_NOTYPE` when the type
    /// index does not resolve.
    fn type_of_sym(&self, sym: &DataSym) -> Ty<'_> {
        self.graph.get(sym.type_index).unwrap_or_else(|e| {
            warn!(name = %sym.name, %e, "data symbol has an unresolvable type");
            no_type()
        })
    }
}

fn no_type() -> Ty<'static> {
    // unwrap() cannot fail; index 0 is T_NOTYPE in the primitive table.
    Ty::Primitive(primitive_type(TypeIndex(0)).unwrap())
}
