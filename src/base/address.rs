use core::ops::RangeInclusive;
use core::str::FromStr;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressError {
    NotShort,
    NotGroup,
    InvalidAddress,
}

impl std::fmt::Display for AddressError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        match self {
            AddressError::NotShort => write!(fmt, "Not a short address"),
            AddressError::NotGroup => write!(fmt, "Not a group address"),
            AddressError::InvalidAddress => write!(fmt, "Invalid address"),
        }
    }
}

impl std::error::Error for AddressError {}

/// Individual ballast address, 0..=63.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Short(u8);

impl Short {
    const RANGE: RangeInclusive<u8> = 0..=63;

    /// Panics if `a` is out of range. Use `from_value` for unchecked input.
    pub fn new(a: u8) -> Short {
        assert!(Self::RANGE.contains(&a));
        Short(a)
    }

    pub fn from_value<A>(a: A) -> Result<Short, AddressError>
    where
        A: TryInto<u8>,
    {
        let Ok(a) = a.try_into() else {
            return Err(AddressError::NotShort);
        };
        if !Self::RANGE.contains(&a) {
            return Err(AddressError::NotShort);
        }
        Ok(Short(a))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for Short {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        self.0.fmt(fmt)
    }
}

impl FromStr for Short {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u8::from_str(s).map_or(Err(AddressError::NotShort), Self::from_value)
    }
}

/// Group address, 0..=15.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Group(u8);

impl Group {
    const RANGE: RangeInclusive<u8> = 0..=15;

    /// Panics if `a` is out of range. Use `from_value` for unchecked input.
    pub fn new(a: u8) -> Group {
        assert!(Self::RANGE.contains(&a));
        Group(a)
    }

    pub fn from_value<A>(a: A) -> Result<Group, AddressError>
    where
        A: TryInto<u8>,
    {
        let Ok(a) = a.try_into() else {
            return Err(AddressError::NotGroup);
        };
        if !Self::RANGE.contains(&a) {
            return Err(AddressError::NotGroup);
        }
        Ok(Group(a))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        self.0.fmt(fmt)
    }
}

impl FromStr for Group {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u8::from_str(s).map_or(Err(AddressError::NotGroup), Self::from_value)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Address {
    Short(Short),
    Group(Group),
    Broadcast,
}

impl Address {
    /// Derive an address from optional short and group numbers.
    /// A short address wins over a group; neither means broadcast.
    pub fn from_parts(short: Option<u8>, group: Option<u8>) -> Result<Address, AddressError> {
        match (short, group) {
            (Some(s), _) => Ok(Address::Short(Short::from_value(s)?)),
            (None, Some(g)) => Ok(Address::Group(Group::from_value(g)?)),
            (None, None) => Ok(Address::Broadcast),
        }
    }

    /// Address byte as it appears on the bus, upper 7 bits used.
    /// Bit 0 (the level/command marker) is left clear.
    pub fn to_bus_addr(&self) -> u8 {
        match self {
            Address::Short(a) => a.0 << 1,
            Address::Group(g) => 0x80 | (g.0 << 1),
            Address::Broadcast => 0xfe,
        }
    }

    pub fn from_bus_addr(bus: u8) -> Result<Address, AddressError> {
        match bus >> 1 {
            a @ 0..=0x3f => Ok(Address::Short(Short(a))),
            a @ 0x40..=0x4f => Ok(Address::Group(Group(a & 0x0f))),
            0x7f => Ok(Address::Broadcast),
            _ => Err(AddressError::InvalidAddress),
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(self, Address::Short(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Address::Group(_))
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Address::Broadcast)
    }

    pub fn to_short(&self) -> Option<Short> {
        match self {
            Address::Short(a) => Some(*a),
            _ => None,
        }
    }

    pub fn to_group(&self) -> Option<Group> {
        match self {
            Address::Group(g) => Some(*g),
            _ => None,
        }
    }
}

impl From<Short> for Address {
    fn from(a: Short) -> Self {
        Address::Short(a)
    }
}

impl From<Group> for Address {
    fn from(a: Group) -> Self {
        Address::Group(a)
    }
}

impl std::cmp::PartialEq<Short> for Address {
    fn eq(&self, other: &Short) -> bool {
        match self {
            Address::Short(a) => a == other,
            _ => false,
        }
    }
}

impl std::cmp::PartialEq<Group> for Address {
    fn eq(&self, other: &Group) -> bool {
        match self {
            Address::Group(g) => g == other,
            _ => false,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        match self {
            Address::Short(a) => write!(fmt, "short {}", a),
            Address::Group(g) => write!(fmt, "group {}", g),
            Address::Broadcast => write!(fmt, "broadcast"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Address, AddressError, Group, Short};

    #[test]
    fn short_address_test() {
        let a = Short::new(0);
        let b: Address = a.into();
        assert_eq!(b, Short::new(0));
        assert_eq!(b.to_bus_addr(), 0x00);

        let a = Short::new(63);
        let b: Address = a.into();
        assert_eq!(b, Short::new(63));
        assert_eq!(b.to_bus_addr(), 0x7e);
        assert_eq!(Address::from_bus_addr(0x7e).unwrap(), b);

        assert_eq!(Short::from_value(64), Err(AddressError::NotShort));
    }

    #[test]
    fn group_address_test() {
        let a = Group::new(0);
        let b: Address = a.into();
        assert_eq!(b, Group::new(0));
        assert_eq!(b.to_bus_addr(), 0x80);

        let b: Address = Group::new(15).into();
        assert_eq!(b.to_bus_addr(), 0x9e);
        assert_eq!(Address::from_bus_addr(0x9e).unwrap(), b);

        assert_eq!(Group::from_value(16), Err(AddressError::NotGroup));
    }

    #[test]
    fn broadcast_test() {
        assert_eq!(Address::Broadcast.to_bus_addr(), 0xfe);
        assert_eq!(Address::from_bus_addr(0xfe).unwrap(), Address::Broadcast);
        assert_eq!(
            Address::from_bus_addr(0xa0),
            Err(AddressError::InvalidAddress)
        );
    }

    #[test]
    fn from_parts_test() {
        assert_eq!(
            Address::from_parts(Some(3), None).unwrap(),
            Address::from(Short::new(3))
        );
        assert_eq!(
            Address::from_parts(Some(3), Some(1)).unwrap(),
            Address::from(Short::new(3))
        );
        assert_eq!(
            Address::from_parts(None, Some(1)).unwrap(),
            Address::from(Group::new(1))
        );
        assert_eq!(Address::from_parts(None, None).unwrap(), Address::Broadcast);
    }
}
