/// Process-unique handle of one UE's aggregate CU-CP context.  Also used as the
/// gNB-CU UE F1AP ID, the gNB-CU-CP UE E1AP ID and the RAN UE NGAP ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UeIndex(pub u32);

impl std::fmt::Display for UeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DuIndex(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CuUpIndex(pub u32);

/// Physical cell ID, 0..=1007.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pci(pub u16);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rnti(pub u16);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GnbDuUeF1apId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AmfUeNgapId(pub u64);
