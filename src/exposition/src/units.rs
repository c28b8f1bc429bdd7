//! UCUM unit to Prometheus unit-suffix resolution

use std::cell::RefCell;
use std::collections::HashMap;

/// Resolves a UCUM unit string into the word appended to metric names
pub trait UnitResolver {
    /// `None` means no unit suffix at all
    fn resolve(&self, unit: &str) -> Option<String>;
}

/// (singular, plural)
type UnitWords = (&'static str, &'static str);

/// <https://unitsofmeasure.org/ucum#section-Base-Units>, derived unit atoms and
/// information technology units
const BASE_UNITS: &[(&str, UnitWords)] = &[
    ("m", ("meter", "meters")),
    ("s", ("second", "seconds")),
    ("g", ("gram", "grams")),
    ("rad", ("radian", "radians")),
    ("K", ("kelvin", "kelvin")),
    ("C", ("coulomb", "coulombs")),
    ("cd", ("candela", "candelas")),
    ("mol", ("mole", "moles")),
    ("sr", ("steradian", "steradians")),
    ("Hz", ("hertz", "hertz")),
    ("N", ("newton", "newtons")),
    ("Pa", ("pascal", "pascals")),
    ("J", ("joule", "joules")),
    ("W", ("watt", "watts")),
    ("A", ("ampere", "amperes")),
    ("V", ("volt", "volts")),
    ("F", ("farad", "farads")),
    ("Ohm", ("ohm", "ohms")),
    ("S", ("siemens", "siemens")),
    ("Wb", ("weber", "webers")),
    ("Cel", ("celsius", "celsius")),
    ("T", ("tesla", "teslas")),
    ("H", ("henry", "henries")),
    ("lm", ("lumen", "lumens")),
    ("lx", ("lux", "lux")),
    ("Bq", ("becquerel", "becquerels")),
    ("Gy", ("gray", "grays")),
    ("Sv", ("sievert", "sieverts")),
    ("bit", ("bit", "bits")),
    ("By", ("byte", "bytes")),
    ("Bd", ("baud", "bauds")),
];

/// Units that never take a prefix
const UNITS: &[(&str, UnitWords)] = &[
    ("min", ("minute", "minutes")),
    ("h", ("hour", "hours")),
    ("d", ("day", "days")),
    ("wk", ("week", "weeks")),
    ("mo", ("month", "months")),
    ("y", ("year", "years")),
    ("%", ("percent", "percent")),
    ("1", ("ratio", "ratio")),
];

/// SI and binary prefixes, checked in this order
const UNIT_PREFIXES: &[(&str, &str)] = &[
    ("Q", "quetta"),
    ("R", "ronna"),
    ("Y", "yotta"),
    ("Z", "zetta"),
    ("E", "exa"),
    ("P", "peta"),
    ("T", "tera"),
    ("G", "giga"),
    ("M", "mega"),
    ("k", "kilo"),
    ("h", "hecto"),
    ("da", "deka"),
    ("d", "deci"),
    ("c", "centi"),
    ("m", "milli"),
    ("u", "micro"),
    ("n", "nano"),
    ("p", "pico"),
    ("f", "femto"),
    ("a", "atto"),
    ("z", "zepto"),
    ("y", "yocto"),
    ("Ki", "kibi"),
    ("Mi", "mebi"),
    ("Gi", "gibi"),
    ("Ti", "tebi"),
    ("Pi", "pebi"),
    ("Ei", "exbi"),
    ("Zi", "zebi"),
    ("Yi", "yobi"),
    ("Ri", "robi"),
    ("Qi", "quebi"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plurality {
    Singular,
    Plural,
}

fn pick(words: UnitWords, plurality: Plurality) -> &'static str {
    match plurality {
        Plurality::Singular => words.0,
        Plurality::Plural => words.1,
    }
}

/// Table-driven resolver over the UCUM unit atoms
#[derive(Debug, Clone)]
pub struct DefaultUnitResolver {
    base_units: &'static [(&'static str, UnitWords)],
    units: &'static [(&'static str, UnitWords)],
    prefixes: &'static [(&'static str, &'static str)],
}

impl Default for DefaultUnitResolver {
    fn default() -> Self {
        Self {
            base_units: BASE_UNITS,
            units: UNITS,
            prefixes: UNIT_PREFIXES,
        }
    }
}

impl DefaultUnitResolver {
    fn lookup(table: &[(&str, UnitWords)], unit: &str) -> Option<UnitWords> {
        table
            .iter()
            .find(|(symbol, _)| *symbol == unit)
            .map(|(_, words)| *words)
    }

    fn unit(&self, unit: &str, plurality: Plurality) -> String {
        if let Some(words) =
            Self::lookup(self.base_units, unit).or_else(|| Self::lookup(self.units, unit))
        {
            return pick(words, plurality).to_string();
        }

        for (prefix, word) in self.prefixes {
            if let Some(rest) = unit.strip_prefix(prefix)
                && let Some(words) = Self::lookup(self.base_units, rest)
            {
                return format!("{word}{}", pick(words, plurality));
            }
        }

        unit.to_string()
    }
}

/// Drop every `{...}` annotation
fn strip_annotations(unit: &str) -> String {
    let mut stripped = String::with_capacity(unit.len());
    let mut rest = unit;
    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(close) => {
                stripped.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    stripped.push_str(rest);
    stripped
}

impl UnitResolver for DefaultUnitResolver {
    fn resolve(&self, unit: &str) -> Option<String> {
        let unit = strip_annotations(unit);
        let mut parts = unit.split('/');
        let numerator = parts.next().filter(|n| !n.is_empty())?;

        let mut resolved = self.unit(numerator, Plurality::Plural);
        for denominator in parts.filter(|p| !p.is_empty()) {
            resolved.push_str("_per_");
            resolved.push_str(&self.unit(denominator, Plurality::Singular));
        }

        Some(resolved)
    }
}

/// Memoizes another resolver for the lifetime of one write
pub struct CachedUnitResolver<'r, R: UnitResolver + ?Sized> {
    inner: &'r R,
    cache: RefCell<HashMap<String, Option<String>>>,
}

impl<'r, R: UnitResolver + ?Sized> CachedUnitResolver<'r, R> {
    pub fn new(inner: &'r R) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }
}

impl<R: UnitResolver + ?Sized> UnitResolver for CachedUnitResolver<'_, R> {
    fn resolve(&self, unit: &str) -> Option<String> {
        if let Some(resolved) = self.cache.borrow().get(unit) {
            return resolved.clone();
        }

        let resolved = self.inner.resolve(unit);
        self.cache
            .borrow_mut()
            .insert(unit.to_string(), resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn resolve(unit: &str) -> Option<String> {
        DefaultUnitResolver::default().resolve(unit)
    }

    #[test]
    fn test_base_and_extra_units() {
        assert_eq!(resolve("1").as_deref(), Some("ratio"));
        assert_eq!(resolve("m").as_deref(), Some("meters"));
        assert_eq!(resolve("s").as_deref(), Some("seconds"));
        assert_eq!(resolve("By").as_deref(), Some("bytes"));
        assert_eq!(resolve("%").as_deref(), Some("percent"));
        assert_eq!(resolve("h").as_deref(), Some("hours"));
        assert_eq!(resolve("min").as_deref(), Some("minutes"));
    }

    #[test]
    fn test_prefixed_units() {
        assert_eq!(resolve("ms").as_deref(), Some("milliseconds"));
        assert_eq!(resolve("KiBy").as_deref(), Some("kibibytes"));
        assert_eq!(resolve("MiBy").as_deref(), Some("mebibytes"));
        assert_eq!(resolve("kHz").as_deref(), Some("kilohertz"));
        assert_eq!(resolve("dam").as_deref(), Some("dekameters"));
        assert_eq!(resolve("us").as_deref(), Some("microseconds"));
    }

    #[test]
    fn test_rates() {
        assert_eq!(resolve("By/s").as_deref(), Some("bytes_per_second"));
        assert_eq!(resolve("m/s").as_deref(), Some("meters_per_second"));
        assert_eq!(resolve("1/s").as_deref(), Some("ratio_per_second"));
        assert_eq!(resolve("{packet}/s").as_deref(), None);
        assert_eq!(resolve("By//s").as_deref(), Some("bytes_per_second"));
        assert_eq!(resolve("1/{request}").as_deref(), Some("ratio"));
    }

    #[test]
    fn test_annotations_only() {
        assert_eq!(resolve("{packets}"), None);
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("By{transmitted}").as_deref(), Some("bytes"));
    }

    #[test]
    fn test_unknown_units_pass_through() {
        assert_eq!(resolve("widgets").as_deref(), Some("widgets"));
        assert_eq!(resolve("ks/foo").as_deref(), Some("kiloseconds_per_foo"));
        assert_eq!(resolve("{open").as_deref(), Some("{open"));
    }

    struct CountingResolver {
        calls: Cell<usize>,
    }

    impl UnitResolver for CountingResolver {
        fn resolve(&self, unit: &str) -> Option<String> {
            self.calls.set(self.calls.get() + 1);
            DefaultUnitResolver::default().resolve(unit)
        }
    }

    #[test]
    fn test_cached_resolver_resolves_once() {
        let counting = CountingResolver {
            calls: Cell::new(0),
        };
        let cached = CachedUnitResolver::new(&counting);

        assert_eq!(cached.resolve("ms").as_deref(), Some("milliseconds"));
        assert_eq!(cached.resolve("ms").as_deref(), Some("milliseconds"));
        assert_eq!(cached.resolve("{x}"), None);
        assert_eq!(cached.resolve("{x}"), None);
        assert_eq!(counting.calls.get(), 2);
    }
}
