//! Pool values and their binary encoding
//!
//! Each value is stored as a type category, a type id, a subtype id and an
//! encoded data block. Numeric and temporal literals are encoded with an
//! order-preserving key in front of the lexical form, so the byte comparator
//! sorts them by value while the exact lexical form survives a round trip.

use super::comparator::SpComparator;
use super::{StringPoolError, StringPoolResult, TypeCategory};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use oxrdf::{Literal, NamedNode, Term};
use std::cmp::Ordering;

/// Type id of literals whose datatype is not in the registry.
pub const UNKNOWN_TYPE_ID: u8 = 127;

/// Members of the xsd:decimal family that are stored with an integer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerKind {
    Integer,
    NonPositiveInteger,
    NegativeInteger,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    PositiveInteger,
}

const INTEGER_KINDS: [IntegerKind; 13] = [
    IntegerKind::Integer,
    IntegerKind::NonPositiveInteger,
    IntegerKind::NegativeInteger,
    IntegerKind::Long,
    IntegerKind::Int,
    IntegerKind::Short,
    IntegerKind::Byte,
    IntegerKind::NonNegativeInteger,
    IntegerKind::UnsignedLong,
    IntegerKind::UnsignedInt,
    IntegerKind::UnsignedShort,
    IntegerKind::UnsignedByte,
    IntegerKind::PositiveInteger,
];

impl IntegerKind {
    fn iri(self) -> &'static str {
        match self {
            IntegerKind::Integer => "http://www.w3.org/2001/XMLSchema#integer",
            IntegerKind::NonPositiveInteger => "http://www.w3.org/2001/XMLSchema#nonPositiveInteger",
            IntegerKind::NegativeInteger => "http://www.w3.org/2001/XMLSchema#negativeInteger",
            IntegerKind::Long => "http://www.w3.org/2001/XMLSchema#long",
            IntegerKind::Int => "http://www.w3.org/2001/XMLSchema#int",
            IntegerKind::Short => "http://www.w3.org/2001/XMLSchema#short",
            IntegerKind::Byte => "http://www.w3.org/2001/XMLSchema#byte",
            IntegerKind::NonNegativeInteger => "http://www.w3.org/2001/XMLSchema#nonNegativeInteger",
            IntegerKind::UnsignedLong => "http://www.w3.org/2001/XMLSchema#unsignedLong",
            IntegerKind::UnsignedInt => "http://www.w3.org/2001/XMLSchema#unsignedInt",
            IntegerKind::UnsignedShort => "http://www.w3.org/2001/XMLSchema#unsignedShort",
            IntegerKind::UnsignedByte => "http://www.w3.org/2001/XMLSchema#unsignedByte",
            IntegerKind::PositiveInteger => "http://www.w3.org/2001/XMLSchema#positiveInteger",
        }
    }

    fn subtype_id(self) -> u8 {
        INTEGER_KINDS
            .iter()
            .position(|kind| *kind == self)
            .map_or(0, |index| index as u8 + 1)
    }

    fn bounds(self) -> (i128, i128) {
        match self {
            IntegerKind::Integer => (i128::MIN, i128::MAX),
            IntegerKind::NonPositiveInteger => (i128::MIN, 0),
            IntegerKind::NegativeInteger => (i128::MIN, -1),
            IntegerKind::Long => (i64::MIN as i128, i64::MAX as i128),
            IntegerKind::Int => (i32::MIN as i128, i32::MAX as i128),
            IntegerKind::Short => (i16::MIN as i128, i16::MAX as i128),
            IntegerKind::Byte => (i8::MIN as i128, i8::MAX as i128),
            IntegerKind::NonNegativeInteger => (0, i128::MAX),
            IntegerKind::UnsignedLong => (0, u64::MAX as i128),
            IntegerKind::UnsignedInt => (0, u32::MAX as i128),
            IntegerKind::UnsignedShort => (0, u16::MAX as i128),
            IntegerKind::UnsignedByte => (0, u8::MAX as i128),
            IntegerKind::PositiveInteger => (1, i128::MAX),
        }
    }
}

/// Registered XML Schema datatypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XsdType {
    Decimal,
    Integer(IntegerKind),
    Float,
    Double,
    Date,
    DateTime,
    GYearMonth,
    GYear,
    GMonthDay,
    GDay,
    GMonth,
    Boolean,
    Base64Binary,
    HexBinary,
    XmlLiteral,
}

const SIMPLE_TYPES: [XsdType; 14] = [
    XsdType::Decimal,
    XsdType::Float,
    XsdType::Double,
    XsdType::Date,
    XsdType::DateTime,
    XsdType::GYearMonth,
    XsdType::GYear,
    XsdType::GMonthDay,
    XsdType::GDay,
    XsdType::GMonth,
    XsdType::Boolean,
    XsdType::Base64Binary,
    XsdType::HexBinary,
    XsdType::XmlLiteral,
];

impl XsdType {
    /// Look up a datatype IRI in the registry.
    pub fn from_iri(iri: &str) -> Option<Self> {
        SIMPLE_TYPES
            .iter()
            .copied()
            .find(|ty| ty.iri() == iri)
            .or_else(|| {
                INTEGER_KINDS
                    .iter()
                    .copied()
                    .find(|kind| kind.iri() == iri)
                    .map(XsdType::Integer)
            })
    }

    /// Datatype IRI
    pub fn iri(self) -> &'static str {
        match self {
            XsdType::Decimal => "http://www.w3.org/2001/XMLSchema#decimal",
            XsdType::Integer(kind) => kind.iri(),
            XsdType::Float => "http://www.w3.org/2001/XMLSchema#float",
            XsdType::Double => "http://www.w3.org/2001/XMLSchema#double",
            XsdType::Date => "http://www.w3.org/2001/XMLSchema#date",
            XsdType::DateTime => "http://www.w3.org/2001/XMLSchema#dateTime",
            XsdType::GYearMonth => "http://www.w3.org/2001/XMLSchema#gYearMonth",
            XsdType::GYear => "http://www.w3.org/2001/XMLSchema#gYear",
            XsdType::GMonthDay => "http://www.w3.org/2001/XMLSchema#gMonthDay",
            XsdType::GDay => "http://www.w3.org/2001/XMLSchema#gDay",
            XsdType::GMonth => "http://www.w3.org/2001/XMLSchema#gMonth",
            XsdType::Boolean => "http://www.w3.org/2001/XMLSchema#boolean",
            XsdType::Base64Binary => "http://www.w3.org/2001/XMLSchema#base64Binary",
            XsdType::HexBinary => "http://www.w3.org/2001/XMLSchema#hexBinary",
            XsdType::XmlLiteral => "http://www.w3.org/1999/02/22-rdf-syntax-ns#XMLLiteral",
        }
    }

    /// Type id used as the second ordering key.
    pub fn type_id(self) -> u8 {
        match self {
            XsdType::Decimal | XsdType::Integer(_) => 2,
            XsdType::Float => 3,
            XsdType::Double => 4,
            XsdType::Date => 5,
            XsdType::DateTime => 6,
            XsdType::GYearMonth => 7,
            XsdType::GYear => 8,
            XsdType::GMonthDay => 9,
            XsdType::GDay => 10,
            XsdType::GMonth => 11,
            XsdType::Boolean => 12,
            XsdType::Base64Binary => 13,
            XsdType::HexBinary => 14,
            XsdType::XmlLiteral => 15,
        }
    }

    /// Subtype id; only the decimal family has more than one.
    pub fn subtype_id(self) -> u8 {
        match self {
            XsdType::Integer(kind) => kind.subtype_id(),
            _ => 0,
        }
    }

    /// Inverse of `type_id` and `subtype_id`.
    pub fn from_ids(type_id: u8, subtype_id: u8) -> Option<Self> {
        if type_id == 2 && subtype_id > 0 {
            return INTEGER_KINDS
                .get(subtype_id as usize - 1)
                .copied()
                .map(XsdType::Integer);
        }
        SIMPLE_TYPES
            .iter()
            .copied()
            .find(|ty| ty.type_id() == type_id && subtype_id == 0)
    }

    /// Length of the fixed value key that precedes the lexical form.
    fn key_len(self) -> usize {
        match self {
            XsdType::Integer(_) => 16,
            XsdType::Float | XsdType::Double | XsdType::Date | XsdType::DateTime => 8,
            XsdType::Boolean => 1,
            _ => 0,
        }
    }

    /// Validate `lexical` and produce the data block.
    fn encode(self, lexical: &str) -> Result<Vec<u8>, String> {
        let key: Vec<u8> = match self {
            XsdType::Decimal => {
                parse_decimal(lexical).ok_or_else(|| format!("invalid xsd:decimal {:?}", lexical))?;
                Vec::new()
            }
            XsdType::Integer(kind) => {
                let value: i128 = lexical
                    .parse()
                    .map_err(|_| format!("invalid <{}> value {:?}", kind.iri(), lexical))?;
                let (min, max) = kind.bounds();
                if value < min || value > max {
                    return Err(format!("{} is out of range for <{}>", lexical, kind.iri()));
                }
                integer_key(value).to_vec()
            }
            XsdType::Float => {
                let value: f32 = lexical
                    .parse()
                    .map_err(|_| format!("invalid xsd:float {:?}", lexical))?;
                double_key(value as f64).to_vec()
            }
            XsdType::Double => {
                let value: f64 = lexical
                    .parse()
                    .map_err(|_| format!("invalid xsd:double {:?}", lexical))?;
                double_key(value).to_vec()
            }
            XsdType::Date => timestamp_key(parse_date(lexical)?).to_vec(),
            XsdType::DateTime => timestamp_key(parse_date_time(lexical)?).to_vec(),
            XsdType::GYearMonth => {
                let core = strip_timezone(lexical);
                match core.rsplit_once('-') {
                    Some((year, month)) if is_year(year) && is_month(month) => Vec::new(),
                    _ => return Err(format!("invalid xsd:gYearMonth {:?}", lexical)),
                }
            }
            XsdType::GYear => {
                if !is_year(strip_timezone(lexical)) {
                    return Err(format!("invalid xsd:gYear {:?}", lexical));
                }
                Vec::new()
            }
            XsdType::GMonthDay => {
                let core = strip_timezone(lexical);
                let valid = core
                    .strip_prefix("--")
                    .and_then(|rest| rest.split_once('-'))
                    .map_or(false, |(month, day)| is_month(month) && is_day(day));
                if !valid {
                    return Err(format!("invalid xsd:gMonthDay {:?}", lexical));
                }
                Vec::new()
            }
            XsdType::GDay => {
                let valid = strip_timezone(lexical)
                    .strip_prefix("---")
                    .map_or(false, is_day);
                if !valid {
                    return Err(format!("invalid xsd:gDay {:?}", lexical));
                }
                Vec::new()
            }
            XsdType::GMonth => {
                let valid = strip_timezone(lexical)
                    .strip_prefix("--")
                    .map_or(false, is_month);
                if !valid {
                    return Err(format!("invalid xsd:gMonth {:?}", lexical));
                }
                Vec::new()
            }
            XsdType::Boolean => match lexical {
                "true" | "1" => vec![1],
                "false" | "0" => vec![0],
                _ => return Err(format!("invalid xsd:boolean {:?}", lexical)),
            },
            XsdType::Base64Binary => {
                if !is_base64(lexical) {
                    return Err(format!("invalid xsd:base64Binary {:?}", lexical));
                }
                Vec::new()
            }
            XsdType::HexBinary => {
                if lexical.len() % 2 != 0 || !lexical.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(format!("invalid xsd:hexBinary {:?}", lexical));
                }
                Vec::new()
            }
            XsdType::XmlLiteral => Vec::new(),
        };

        let mut data = key;
        data.extend_from_slice(lexical.as_bytes());
        Ok(data)
    }
}

/// A value stored in the node pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpObject {
    /// An IRI reference
    Uri(String),
    /// A plain or language-tagged literal
    UntypedLiteral {
        lexical: String,
        language: Option<String>,
    },
    /// A literal with an explicit datatype other than xsd:string
    TypedLiteral { datatype: String, lexical: String },
}

/// The ordering keys and data block of an [`SpObject`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedValue {
    pub category: TypeCategory,
    pub type_id: u8,
    pub subtype_id: u8,
    pub data: Vec<u8>,
}

impl EncodedValue {
    /// Comparator for the value's type.
    pub fn comparator(&self) -> SpComparator {
        SpComparator::for_type(self.category, self.type_id)
    }
}

impl SpObject {
    /// Convert a non-blank RDF term.
    pub fn from_term(term: &Term) -> StringPoolResult<Self> {
        match term {
            Term::NamedNode(node) => Ok(SpObject::Uri(node.as_str().to_string())),
            Term::Literal(literal) => Ok(Self::from_literal(literal)),
            #[allow(unreachable_patterns)]
            _ => Err(StringPoolError::Localize(format!(
                "{} cannot be stored as a pool value",
                term
            ))),
        }
    }

    /// Convert a literal. Simple literals become untyped literals.
    pub fn from_literal(literal: &Literal) -> Self {
        if let Some(language) = literal.language() {
            SpObject::UntypedLiteral {
                lexical: literal.value().to_string(),
                language: Some(language.to_string()),
            }
        } else if literal.datatype() == oxrdf::vocab::xsd::STRING {
            SpObject::UntypedLiteral {
                lexical: literal.value().to_string(),
                language: None,
            }
        } else {
            SpObject::TypedLiteral {
                datatype: literal.datatype().as_str().to_string(),
                lexical: literal.value().to_string(),
            }
        }
    }

    /// Convert back into an RDF term.
    pub fn to_term(&self) -> StringPoolResult<Term> {
        match self {
            SpObject::Uri(iri) => NamedNode::new(iri.as_str())
                .map(Term::NamedNode)
                .map_err(|e| StringPoolError::Globalize(format!("invalid stored IRI {}: {}", iri, e))),
            SpObject::UntypedLiteral {
                lexical,
                language: Some(language),
            } => Literal::new_language_tagged_literal(lexical.as_str(), language.as_str())
                .map(Term::Literal)
                .map_err(|e| StringPoolError::Globalize(format!("invalid stored language tag {}: {}", language, e))),
            SpObject::UntypedLiteral {
                lexical,
                language: None,
            } => Ok(Term::Literal(Literal::new_simple_literal(lexical.as_str()))),
            SpObject::TypedLiteral { datatype, lexical } => {
                let datatype = NamedNode::new(datatype.as_str()).map_err(|e| {
                    StringPoolError::Globalize(format!("invalid stored datatype {}: {}", datatype, e))
                })?;
                Ok(Term::Literal(Literal::new_typed_literal(lexical.as_str(), datatype)))
            }
        }
    }

    /// Type category of the value
    pub fn type_category(&self) -> TypeCategory {
        match self {
            SpObject::Uri(_) => TypeCategory::Uri,
            SpObject::UntypedLiteral { .. } => TypeCategory::UntypedLiteral,
            SpObject::TypedLiteral { .. } => TypeCategory::TypedLiteral,
        }
    }

    /// Registered datatype of a typed literal
    pub fn xsd_type(&self) -> Option<XsdType> {
        match self {
            SpObject::TypedLiteral { datatype, .. } => XsdType::from_iri(datatype),
            _ => None,
        }
    }

    /// Validate and encode the value.
    pub fn encode(&self) -> StringPoolResult<EncodedValue> {
        match self {
            SpObject::Uri(iri) => Ok(EncodedValue {
                category: TypeCategory::Uri,
                type_id: 0,
                subtype_id: 0,
                data: iri.as_bytes().to_vec(),
            }),
            SpObject::UntypedLiteral { lexical, language } => {
                let language = language.as_deref().unwrap_or("");
                if language.len() > u8::MAX as usize {
                    return Err(StringPoolError::Localize(format!(
                        "language tag {:?} is too long",
                        language
                    )));
                }
                let mut data = Vec::with_capacity(1 + language.len() + lexical.len());
                data.push(language.len() as u8);
                data.extend_from_slice(language.as_bytes());
                data.extend_from_slice(lexical.as_bytes());
                Ok(EncodedValue {
                    category: TypeCategory::UntypedLiteral,
                    type_id: 0,
                    subtype_id: 0,
                    data,
                })
            }
            SpObject::TypedLiteral { datatype, lexical } => match XsdType::from_iri(datatype) {
                Some(ty) => {
                    let data = ty.encode(lexical).map_err(StringPoolError::Localize)?;
                    Ok(EncodedValue {
                        category: TypeCategory::TypedLiteral,
                        type_id: ty.type_id(),
                        subtype_id: ty.subtype_id(),
                        data,
                    })
                }
                None => {
                    if datatype.len() > u16::MAX as usize {
                        return Err(StringPoolError::Localize(format!(
                            "datatype IRI of {} bytes is too long",
                            datatype.len()
                        )));
                    }
                    let mut data = Vec::with_capacity(2 + datatype.len() + lexical.len());
                    data.extend_from_slice(&(datatype.len() as u16).to_be_bytes());
                    data.extend_from_slice(datatype.as_bytes());
                    data.extend_from_slice(lexical.as_bytes());
                    Ok(EncodedValue {
                        category: TypeCategory::TypedLiteral,
                        type_id: UNKNOWN_TYPE_ID,
                        subtype_id: 0,
                        data,
                    })
                }
            },
        }
    }

    /// Rebuild a value from its stored form.
    pub fn decode(category: TypeCategory, type_id: u8, subtype_id: u8, data: &[u8]) -> Result<Self, String> {
        match category {
            TypeCategory::Uri => Ok(SpObject::Uri(utf8(data)?)),
            TypeCategory::UntypedLiteral => {
                let (language, lexical) =
                    split_untyped(data).ok_or_else(|| "truncated untyped literal".to_string())?;
                let language = utf8(language)?;
                Ok(SpObject::UntypedLiteral {
                    lexical: utf8(lexical)?,
                    language: if language.is_empty() { None } else { Some(language) },
                })
            }
            TypeCategory::TypedLiteral if type_id == UNKNOWN_TYPE_ID => {
                let (datatype, lexical) =
                    split_unknown(data).ok_or_else(|| "truncated typed literal".to_string())?;
                Ok(SpObject::TypedLiteral {
                    datatype: utf8(datatype)?,
                    lexical: utf8(lexical)?,
                })
            }
            TypeCategory::TypedLiteral => {
                let ty = XsdType::from_ids(type_id, subtype_id)
                    .ok_or_else(|| format!("unknown type {}/{}", type_id, subtype_id))?;
                let lexical = data
                    .get(ty.key_len()..)
                    .ok_or_else(|| "truncated typed literal".to_string())?;
                Ok(SpObject::TypedLiteral {
                    datatype: ty.iri().to_string(),
                    lexical: utf8(lexical)?,
                })
            }
            TypeCategory::Unknown | TypeCategory::Blank => {
                Err(format!("category {:?} has no stored values", category))
            }
        }
    }
}

fn utf8(bytes: &[u8]) -> Result<String, String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())
}

/// Split an untyped literal block into language and lexical form.
pub(crate) fn split_untyped(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let len = *data.first()? as usize;
    let language = data.get(1..1 + len)?;
    let lexical = data.get(1 + len..)?;
    Some((language, lexical))
}

fn split_unknown(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let len = u16::from_be_bytes([*data.first()?, *data.get(1)?]) as usize;
    let datatype = data.get(2..2 + len)?;
    let lexical = data.get(2 + len..)?;
    Some((datatype, lexical))
}

/// Length of the value key of typed literals whose value is decided by that
/// key alone, so equal keys mean equal values whatever the lexical form.
pub(crate) fn value_key_len(category: TypeCategory, type_id: u8) -> Option<usize> {
    if category != TypeCategory::TypedLiteral {
        return None;
    }
    match XsdType::from_ids(type_id, 0)? {
        ty @ (XsdType::Float | XsdType::Double | XsdType::Date | XsdType::DateTime | XsdType::Boolean) => {
            Some(ty.key_len())
        }
        _ => None,
    }
}

/// Lexical part of a decimal family data block.
pub(crate) fn decimal_lexical(subtype_id: u8, data: &[u8]) -> &[u8] {
    if subtype_id == 0 {
        data
    } else {
        data.get(16..).unwrap_or(&[])
    }
}

/// Numeric value of a decimal family data block.
pub(crate) fn decimal_value(subtype_id: u8, data: &[u8]) -> Option<Decimal> {
    if subtype_id == 0 {
        parse_decimal(std::str::from_utf8(data).ok()?)
    } else {
        let key: [u8; 16] = data.get(..16)?.try_into().ok()?;
        let value = (u128::from_be_bytes(key) ^ (1u128 << 127)) as i128;
        parse_decimal(&value.to_string())
    }
}

fn integer_key(value: i128) -> [u8; 16] {
    ((value as u128) ^ (1u128 << 127)).to_be_bytes()
}

fn double_key(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let key = if bits >> 63 == 1 { !bits } else { bits | (1 << 63) };
    key.to_be_bytes()
}

fn timestamp_key(millis: i64) -> [u8; 8] {
    ((millis as u64) ^ (1 << 63)).to_be_bytes()
}

fn strip_timezone(lexical: &str) -> &str {
    if let Some(core) = lexical.strip_suffix('Z') {
        return core;
    }
    let bytes = lexical.as_bytes();
    let len = bytes.len();
    if len > 6 && matches!(bytes[len - 6], b'+' | b'-') && bytes[len - 3] == b':' {
        return &lexical[..len - 6];
    }
    lexical
}

fn parse_date(lexical: &str) -> Result<i64, String> {
    let date = NaiveDate::parse_from_str(strip_timezone(lexical), "%Y-%m-%d")
        .map_err(|_| format!("invalid xsd:date {:?}", lexical))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("invalid xsd:date {:?}", lexical))?;
    Ok(Utc.from_utc_datetime(&midnight).timestamp_millis())
}

fn parse_date_time(lexical: &str) -> Result<i64, String> {
    if let Ok(value) = DateTime::parse_from_rfc3339(lexical) {
        return Ok(value.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(lexical, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive).timestamp_millis())
        .map_err(|_| format!("invalid xsd:dateTime {:?}", lexical))
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_year(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    digits.len() >= 4 && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_month(s: &str) -> bool {
    is_digits(s, 2) && matches!(s.parse::<u8>(), Ok(1..=12))
}

fn is_day(s: &str) -> bool {
    is_digits(s, 2) && matches!(s.parse::<u8>(), Ok(1..=31))
}

fn is_base64(lexical: &str) -> bool {
    let mut count = 0usize;
    let mut padding = 0usize;
    for b in lexical.bytes() {
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => continue,
            b'=' => padding += 1,
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' if padding == 0 => {}
            _ => return false,
        }
        count += 1;
    }
    count % 4 == 0 && padding <= 2
}

/// A parsed xsd:decimal, normalised so that equal values compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Decimal {
    negative: bool,
    integer: String,
    fraction: String,
}

pub(crate) fn parse_decimal(lexical: &str) -> Option<Decimal> {
    let (negative, unsigned) = match lexical.as_bytes().first()? {
        b'-' => (true, &lexical[1..]),
        b'+' => (false, &lexical[1..]),
        _ => (false, lexical),
    };
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if integer.is_empty() && fraction.is_empty() {
        return None;
    }
    if !integer.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let integer = integer.trim_start_matches('0').to_string();
    let fraction = fraction.trim_end_matches('0').to_string();
    let negative = negative && !(integer.is_empty() && fraction.is_empty());
    Some(Decimal {
        negative,
        integer,
        fraction,
    })
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let magnitude = self
            .integer
            .len()
            .cmp(&other.integer.len())
            .then_with(|| self.integer.cmp(&other.integer))
            .then_with(|| self.fraction.cmp(&other.fraction));
        match (self.negative, other.negative) {
            (false, false) => magnitude,
            (true, true) => magnitude.reverse(),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(datatype: &str, lexical: &str) -> SpObject {
        SpObject::TypedLiteral {
            datatype: datatype.to_string(),
            lexical: lexical.to_string(),
        }
    }

    #[test]
    fn test_registry_ids() {
        assert_eq!(XsdType::from_iri("http://www.w3.org/2001/XMLSchema#double"), Some(XsdType::Double));
        let int = XsdType::from_iri("http://www.w3.org/2001/XMLSchema#int").unwrap();
        assert_eq!(int.type_id(), 2);
        assert_eq!(XsdType::from_ids(int.type_id(), int.subtype_id()), Some(int));
        assert_eq!(XsdType::from_ids(2, 0), Some(XsdType::Decimal));
        assert_eq!(XsdType::from_iri("http://example.org/custom"), None);
    }

    #[test]
    fn test_invalid_lexical_forms_rejected() {
        let xsd = "http://www.w3.org/2001/XMLSchema#";
        for (local, lexical) in [
            ("double", "abc"),
            ("byte", "300"),
            ("boolean", "yes"),
            ("dateTime", "2020-13-01T00:00:00"),
            ("date", "2020-02-30"),
            ("hexBinary", "abc"),
            ("gMonth", "--13"),
            ("decimal", "1.2.3"),
        ] {
            let object = typed(&format!("{}{}", xsd, local), lexical);
            assert!(
                matches!(object.encode(), Err(StringPoolError::Localize(_))),
                "{} {:?} should be rejected",
                local,
                lexical
            );
        }
    }

    #[test]
    fn test_decode_restores_lexical_form() {
        let xsd = "http://www.w3.org/2001/XMLSchema#";
        for object in [
            typed(&format!("{}int", xsd), "+042"),
            typed(&format!("{}double", xsd), "1.0E3"),
            typed(&format!("{}dateTime", xsd), "2002-05-30T09:00:00+02:00"),
            typed(&format!("{}boolean", xsd), "1"),
            typed("http://example.org/dt", "opaque"),
            SpObject::UntypedLiteral {
                lexical: "chat".to_string(),
                language: Some("fr".to_string()),
            },
            SpObject::Uri("http://example.org/a".to_string()),
        ] {
            let encoded = object.encode().unwrap();
            let decoded =
                SpObject::decode(encoded.category, encoded.type_id, encoded.subtype_id, &encoded.data).unwrap();
            assert_eq!(decoded, object);
        }
    }

    #[test]
    fn test_decimal_ordering() {
        let values = ["-10.5", "-2", "0", "0.25", "1", "1.5", "10"];
        for pair in values.windows(2) {
            let a = parse_decimal(pair[0]).unwrap();
            let b = parse_decimal(pair[1]).unwrap();
            assert!(a < b, "{} < {}", pair[0], pair[1]);
        }
        assert_eq!(parse_decimal("1.50"), parse_decimal("01.5"));
        assert_eq!(parse_decimal("-0"), parse_decimal("0"));
    }

    #[test]
    fn test_numeric_keys_sort_by_value() {
        assert!(double_key(-1.5) < double_key(-0.5));
        assert!(double_key(-0.5) < double_key(0.0));
        assert!(double_key(2.0) < double_key(10.0));
        assert!(integer_key(-3) < integer_key(2));
        assert!(timestamp_key(-1) < timestamp_key(1));
    }
}
