/// Identifier of a grid region.
/// Examples: `A1`, `B3`, `inner-north`
pub type RegionId = String;
/// One normalized unit of post text after tokenization and mapping.
/// Examples: `good`, `#melbourne`, `can't`
pub type Token = String;
/// Integer sentiment weight attached to a lexicon token.
/// Examples: `2`, `-3`
pub type Weight = i64;
