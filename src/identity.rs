//! Cell identities: the network identifiers addressing one antenna sector.

use std::fmt;
use std::str::FromStr;

use strum::{Display, EnumString};

use crate::error::{Error, Result};

/// Radio technology of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Radio {
    Gsm,
    Umts,
    Lte,
}

impl Radio {
    /// Parse a radio name, rejecting anything outside GSM/UMTS/LTE.
    pub fn parse(s: &str) -> Result<Radio> {
        s.parse().map_err(|_| Error::UnknownRadio(s.to_string()))
    }
}

/// The identity of one cell, polymorphic over how the network addresses it.
///
/// Equality and hashing are field-wise: an unset field only equals an unset
/// field, never a concrete value. In queries an unset field acts as a
/// wildcard instead; see [`CellIdentity::subsumes`].
///
/// Use [`CellIdentity::new`] to construct an identity from loose fields; it
/// rejects combinations the radio technology cannot express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellIdentity {
    /// A GSM/UMTS cell global identity, or an identity with unknown radio.
    Global(GlobalCell),
    /// An LTE cell, addressed by its E-UTRAN cell id.
    Lte(LteCell),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalCell {
    /// `None` means the radio technology is unknown, not "any".
    pub radio: Option<Radio>,
    pub mcc: Option<u16>,
    pub mnc: Option<u16>,
    pub lac: Option<u32>,
    pub ci: Option<u64>,
    /// Only present when the radio is unknown and the record may turn out to
    /// be an LTE cell; both interpretations are then tried on lookup.
    pub eci: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LteCell {
    pub mcc: Option<u16>,
    pub mnc: Option<u16>,
    pub eci: Option<u64>,
}

/// Flat column view of an identity, shared by the query builders and the
/// in-memory matcher so both express identical semantics.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IdentityFields {
    pub radio: Option<Radio>,
    pub mcc: Option<u16>,
    pub mnc: Option<u16>,
    pub lac: Option<u32>,
    pub ci: Option<u64>,
    pub eci: Option<u64>,
}

impl CellIdentity {
    /// Build an identity from loose fields, dispatching on the radio.
    ///
    /// GSM and UMTS cells are addressed by lac/ci, LTE cells by eci. With an
    /// unknown radio all fields are kept and lookups try both
    /// interpretations.
    pub fn new(
        radio: Option<Radio>,
        mcc: Option<u16>,
        mnc: Option<u16>,
        lac: Option<u32>,
        ci: Option<u64>,
        eci: Option<u64>,
    ) -> Result<CellIdentity> {
        match radio {
            Some(r @ (Radio::Gsm | Radio::Umts)) => {
                if eci.is_some() {
                    return Err(Error::UnsupportedIdentity(format!(
                        "{r} cells are not addressed by an eci"
                    )));
                }
                Ok(CellIdentity::Global(GlobalCell {
                    radio: Some(r),
                    mcc,
                    mnc,
                    lac,
                    ci,
                    eci: None,
                }))
            }
            Some(Radio::Lte) => {
                if ci.is_some() {
                    return Err(Error::UnsupportedIdentity(
                        "an LTE cell is addressed by its eci, not a legacy cell id".to_string(),
                    ));
                }
                Ok(CellIdentity::Lte(LteCell { mcc, mnc, eci }))
            }
            None => Ok(CellIdentity::Global(GlobalCell {
                radio: None,
                mcc,
                mnc,
                lac,
                ci,
                eci,
            })),
        }
    }

    /// Convenience constructor for an LTE identity.
    pub fn lte(mcc: Option<u16>, mnc: Option<u16>, eci: Option<u64>) -> CellIdentity {
        CellIdentity::Lte(LteCell { mcc, mnc, eci })
    }

    pub fn radio(&self) -> Option<Radio> {
        self.fields().radio
    }

    pub fn mcc(&self) -> Option<u16> {
        self.fields().mcc
    }

    pub fn mnc(&self) -> Option<u16> {
        self.fields().mnc
    }

    pub(crate) fn fields(&self) -> IdentityFields {
        match *self {
            CellIdentity::Global(c) => IdentityFields {
                radio: c.radio,
                mcc: c.mcc,
                mnc: c.mnc,
                lac: c.lac,
                ci: c.ci,
                eci: c.eci,
            },
            CellIdentity::Lte(c) => IdentityFields {
                radio: Some(Radio::Lte),
                mcc: c.mcc,
                mnc: c.mnc,
                lac: None,
                ci: None,
                eci: c.eci,
            },
        }
    }

    /// Query-pattern match of `self` against a concrete record identity.
    ///
    /// Every set field must agree with the record; unset fields are
    /// wildcards. When both a legacy cell id and an eci are set (unknown
    /// radio) the record may match either interpretation.
    pub fn subsumes(&self, record: &CellIdentity) -> bool {
        fn wild<T: PartialEq>(pattern: Option<T>, value: Option<T>) -> bool {
            pattern.is_none() || pattern == value
        }

        let p = self.fields();
        let r = record.fields();
        if !(wild(p.radio, r.radio) && wild(p.mcc, r.mcc) && wild(p.mnc, r.mnc)) {
            return false;
        }

        let legacy_set = p.lac.is_some() || p.ci.is_some();
        let legacy_match = wild(p.lac, r.lac) && wild(p.ci, r.ci);
        match (legacy_set, p.eci) {
            (true, Some(eci)) => legacy_match || Some(eci) == r.eci,
            (true, None) => legacy_match,
            (false, Some(eci)) => Some(eci) == r.eci,
            (false, None) => true,
        }
    }
}

fn slot<T: fmt::Display>(v: &Option<T>) -> String {
    v.as_ref().map(T::to_string).unwrap_or_default()
}

/// The canonical form is `mcc-mnc-lac-ci`, with `mcc-mnc--eci` for LTE
/// cells; unset fields leave their slot empty. When parsing, an empty lac
/// slot followed by an id therefore always reads as LTE. An unknown-radio
/// identity carrying an eci next to its legacy fields appends `/eci`, which
/// is diagnostic output only and not parseable.
impl fmt::Display for CellIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellIdentity::Global(c) => {
                write!(
                    f,
                    "{}-{}-{}-{}",
                    slot(&c.mcc),
                    slot(&c.mnc),
                    slot(&c.lac),
                    slot(&c.ci)
                )?;
                if let Some(eci) = c.eci {
                    write!(f, "/{eci}")?;
                }
                Ok(())
            }
            CellIdentity::Lte(c) => {
                write!(f, "{}-{}--{}", slot(&c.mcc), slot(&c.mnc), slot(&c.eci))
            }
        }
    }
}

impl FromStr for CellIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<CellIdentity> {
        fn num<T: FromStr>(part: &str, what: &str, src: &str) -> Result<Option<T>> {
            if part.is_empty() {
                return Ok(None);
            }
            part.parse()
                .map(Some)
                .map_err(|_| Error::InvalidIdentity(format!("bad {what} in {src:?}")))
        }

        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 4 {
            return Err(Error::InvalidIdentity(format!(
                "expected mcc-mnc-lac-ci, got {s:?}"
            )));
        }
        let mcc = num(parts[0], "mcc", s)?;
        let mnc = num(parts[1], "mnc", s)?;
        if parts[2].is_empty() && !parts[3].is_empty() {
            CellIdentity::new(Some(Radio::Lte), mcc, mnc, None, None, num(parts[3], "eci", s)?)
        } else {
            CellIdentity::new(None, mcc, mnc, num(parts[2], "lac", s)?, num(parts[3], "ci", s)?, None)
        }
    }
}
