use std::collections::HashMap;
use std::fmt;

use edit_distance::edit_distance;

use crate::error::ResolutionErrorKind;
use crate::instruction::Register;

/// Addresses below this one belong to the registers and can not be aliased.
pub const FIRST_USER_ADDRESS: u8 = 10;

/// What a name in the [SymbolTable] resolves to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Symbol {
    /// A memory cell. Registers, `name` aliases and named list elements.
    Address(u8),

    /// The index of the first instruction after a subroutine label.
    Routine(usize),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Symbol::Address(address) => write!(f, "${}", address),
            Symbol::Routine(index) => write!(f, "{}", index),
        }
    }
}

/// Mapping from register names, subroutine labels and variable aliases to addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    inner: HashMap<String, Symbol>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

impl SymbolTable {
    /// Creates a table that only knows the ten fixed registers.
    pub fn new() -> Self {
        let inner = Register::ALL.iter()
            .map(|register| (register.name().to_string(), Symbol::Address(register.address())))
            .collect();

        SymbolTable { inner }
    }

    pub fn get<S: AsRef<str>>(&self, name: S) -> Option<Symbol> {
        self.inner.get(name.as_ref()).copied()
    }

    /// Returns the address bound to `name`, if `name` is an address symbol.
    pub fn address<S: AsRef<str>>(&self, name: S) -> Option<u8> {
        match self.get(name) {
            Some(Symbol::Address(address)) => Some(address),
            _ => None,
        }
    }

    /// Returns the name bound to `address`, if any.
    pub fn owner_of(&self, address: u8) -> Option<&str> {
        self.inner.iter()
            .find(|(_, symbol)| **symbol == Symbol::Address(address))
            .map(|(name, _)| name.as_str())
    }

    /// All entries sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Symbol)> {
        let mut entries = self.inner.iter()
            .map(|(name, symbol)| (name.as_str(), *symbol))
            .collect::<Vec<_>>();

        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Finds the defined name closest to `name`, for "did you mean" hints.
    pub fn closest<S: AsRef<str>>(&self, name: S) -> Option<&str> {
        let name = name.as_ref();

        self.inner.keys()
            .map(|candidate| (edit_distance(candidate, name), candidate))
            .filter(|(distance, _)| *distance <= 2)
            .min()
            .map(|(_, candidate)| candidate.as_str())
    }

    fn ensure_unbound(&self, name: &str) -> Result<(), ResolutionErrorKind> {
        match self.get(name) {
            Some(existing) => Err(ResolutionErrorKind::DuplicateSymbol {
                name: name.to_string(),
                existing,
            }),
            None => Ok(()),
        }
    }

    /// Binds a subroutine label to an instruction index.
    pub(crate) fn define_routine(&mut self, name: &str, index: usize) -> Result<(), ResolutionErrorKind> {
        self.ensure_unbound(name)?;
        self.inner.insert(name.to_string(), Symbol::Routine(index));

        Ok(())
    }

    /// Binds a variable alias to a user memory address.
    pub(crate) fn define_alias(&mut self, name: &str, address: i32) -> Result<(), ResolutionErrorKind> {
        if address < FIRST_USER_ADDRESS as i32 || address > u8::max_value() as i32 {
            return Err(ResolutionErrorKind::ReservedAddress { address });
        }

        self.ensure_unbound(name)?;

        let address = address as u8;

        if let Some(owner) = self.owner_of(address) {
            return Err(ResolutionErrorKind::AddressTaken {
                address,
                owner: owner.to_string(),
            });
        }

        self.inner.insert(name.to_string(), Symbol::Address(address));

        Ok(())
    }
}

#[test]
fn test_seeded_with_registers() {
    let table = SymbolTable::new();

    assert_eq!(table.len(), 10);
    assert_eq!(table.address("a_register"), Some(0));
    assert_eq!(table.address("flag_register"), Some(9));
    assert_eq!(table.owner_of(8), Some("stack_pointer"));
    assert_eq!(table.get("counter"), None);
}

#[test]
fn test_define_alias_rules() {
    let mut table = SymbolTable::new();

    assert_eq!(table.define_alias("counter", 10), Ok(()));
    assert_eq!(table.address("counter"), Some(10));

    assert!(matches!(
        table.define_alias("other", 10),
        Err(ResolutionErrorKind::AddressTaken { address: 10, .. })
    ));

    assert!(matches!(
        table.define_alias("counter", 11),
        Err(ResolutionErrorKind::DuplicateSymbol { .. })
    ));

    assert_eq!(
        table.define_alias("low", 3),
        Err(ResolutionErrorKind::ReservedAddress { address: 3 })
    );
}

#[test]
fn test_routines_and_suggestions() {
    let mut table = SymbolTable::new();

    table.define_routine("print_line", 4).unwrap();
    assert_eq!(table.get("print_line"), Some(Symbol::Routine(4)));
    assert_eq!(table.address("print_line"), None);
    assert_eq!(table.closest("print_lin"), Some("print_line"));
    assert_eq!(table.closest("zzzzzzzz"), None);
    assert_eq!(Symbol::Address(12).to_string(), "$12");
}
