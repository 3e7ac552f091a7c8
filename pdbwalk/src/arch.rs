//! Target architectures, as named by the DBI machine field.

/// The CPU architecture a PDB was built for. Decoded from the COFF machine
/// code in the DBI header.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MachineKind {
    /// Intel 386 (`IMAGE_FILE_MACHINE_I386`, 0x014c)
    I386,
    /// AMD64 (`IMAGE_FILE_MACHINE_AMD64`, 0x8664)
    Amd64,
    /// Itanium (`IMAGE_FILE_MACHINE_IA64`, 0x0200)
    Ia64,
    /// 32-bit ARM (`IMAGE_FILE_MACHINE_ARM`/`ARMNT`)
    Arm,
    /// ARM64 (`IMAGE_FILE_MACHINE_ARM64`, 0xaa64)
    Arm64,
    /// Any machine code this crate does not map, or a PDB with no DBI stream.
    Unknown,
}

impl MachineKind {
    /// Maps a COFF machine code.
    pub fn from_coff(machine: u16) -> MachineKind {
        match machine {
            0x014c => MachineKind::I386,
            0x8664 => MachineKind::Amd64,
            0x0200 => MachineKind::Ia64,
            0x01c0 | 0x01c2 | 0x01c4 => MachineKind::Arm,
            0xaa64 => MachineKind::Arm64,
            _ => MachineKind::Unknown,
        }
    }

    /// The width of a data pointer on this machine, in bytes.
    ///
    /// `Unknown` reports 8; the value only matters when the DBI stream is
    /// absent, and modern PDBs are overwhelmingly 64-bit.
    pub fn pointer_width(self) -> i64 {
        match self {
            MachineKind::I386 | MachineKind::Arm => 4,
            MachineKind::Amd64 | MachineKind::Ia64 | MachineKind::Arm64 => 8,
            MachineKind::Unknown => 8,
        }
    }
}

impl std::fmt::Display for MachineKind {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            MachineKind::I386 => "x86",
            MachineKind::Amd64 => "x64",
            MachineKind::Ia64 => "ia64",
            MachineKind::Arm => "arm",
            MachineKind::Arm64 => "arm64",
            MachineKind::Unknown => "unknown",
        };
        fmt.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_codes() {
        assert_eq!(MachineKind::from_coff(0x014c), MachineKind::I386);
        assert_eq!(MachineKind::from_coff(0x8664), MachineKind::Amd64);
        assert_eq!(MachineKind::from_coff(0x0200), MachineKind::Ia64);
        assert_eq!(MachineKind::from_coff(0xaa64), MachineKind::Arm64);
        assert_eq!(MachineKind::from_coff(0x1234), MachineKind::Unknown);
    }

    #[test]
    fn pointer_widths() {
        assert_eq!(MachineKind::I386.pointer_width(), 4);
        assert_eq!(MachineKind::Amd64.pointer_width(), 8);
        assert_eq!(MachineKind::Unknown.pointer_width(), 8);
    }
}
