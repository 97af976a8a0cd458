use super::address::Address;

/// How the payload byte belonging to a command or its backward frame
/// must be interpreted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DaliValueType {
    DataByte,
    Group,
    Scene,
    Short,
    Random,
    Boolean,
    DataByteAndFalse,
    Null,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommandError {
    MissingValue,
    UnexpectedValue,
    ValueOutOfRange { min: u32, max: u32 },
    MissingAddress,
    UnexpectedAddress,
    MalformedBytecode(u16),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        match self {
            CommandError::MissingValue => write!(fmt, "Command requires a value"),
            CommandError::UnexpectedValue => write!(fmt, "Command takes no value"),
            CommandError::ValueOutOfRange { min, max } => {
                write!(fmt, "Value out of range {}..={}", min, max)
            }
            CommandError::MissingAddress => write!(fmt, "Command requires an address"),
            CommandError::UnexpectedAddress => write!(fmt, "Command takes no address"),
            CommandError::MalformedBytecode(w) => write!(fmt, "Malformed bytecode {:#06x}", w),
        }
    }
}

impl std::error::Error for CommandError {}

/// All forward-frame commands the master can put on the bus.
///
/// Three families: direct arc power, indirect commands addressed to
/// gear (one octet of opcode space) and the special commands used
/// during commissioning, which occupy their own code space and take
/// no gear address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DaliCommandCode {
    Dapc,

    Off,
    Up,
    Down,
    StepUp,
    StepDown,
    RecallMaxLevel,
    RecallMinLevel,
    StepDownAndOff,
    OnAndStepUp,
    EnableDapcSequence,
    GoToLastActiveLevel,
    GoToScene,

    Reset,
    StoreActualLevelInDtr,
    StoreDtrAsMaxLevel,
    StoreDtrAsMinLevel,
    StoreDtrAsSystemFailureLevel,
    StoreDtrAsPowerOnLevel,
    StoreDtrAsFadeTime,
    StoreDtrAsFadeRate,
    StoreDtrAsScene,

    RemoveScene,
    AddToGroup,
    RemoveFromGroup,
    StoreDtrAsShortAddress,

    QueryStatus,
    QueryGearPresent,
    QueryLampFailure,
    QueryLampPowerOn,
    QueryLimitError,
    QueryResetState,
    QueryMissingShortAddress,
    QueryVersionNumber,
    QueryContentDtr,
    QueryDeviceType,
    QueryPhysicalMinLevel,
    QueryPowerFailure,

    QueryActualLevel,
    QueryMaxLevel,
    QueryMinLevel,
    QueryPowerOnLevel,
    QuerySystemFailureLevel,
    QueryFadeTimeAndRate,

    QuerySceneLevel,
    QueryGroups0_7,
    QueryGroups8_15,
    QueryRandomAddressH,
    QueryRandomAddressM,
    QueryRandomAddressL,
    ReadMemoryLocation,

    // IEC 62386-207 LED driver extension
    ReferenceSystemPower,
    EnableCurrentProtector,
    DisableCurrentProtector,
    SetDimmingCurve,
    StoreDtrAsFastFadeTime,
    QueryGearType,
    QueryDimmingCurve,
    QueryPossibleOperatingModes,
    QueryFeatures,
    QueryFailStatus,
    QueryShortCircuit,
    QueryOpenCircuit,
    QueryLoadDecrease,
    QueryLoadIncrease,
    QueryCurrentProtectActive,
    QueryThermalShutdown,
    QueryThermalOverload,
    QueryReferenceRunning,
    QueryReferenceMeasurementFailed,
    QueryCurrentProtectorEnable,
    QueryOperatingMode,
    QueryFastFadeTime,
    QueryMinFastFadeTime,
    QueryExtendedVersionNumber,

    Terminate,
    DataTransferRegister,
    Initialize,
    Randomize,
    Compare,
    Withdraw,
    Ping,
    SearchAddressH,
    SearchAddressM,
    SearchAddressL,
    ProgramShortAddress,
    VerifyShortAddress,
    QueryShortAddress,
    PhysicalSelection,
    EnableDeviceOfType,
    SetDtr1,
    SetDtr2,
    WriteMemoryLocation,
}

use DaliCommandCode::*;

impl DaliCommandCode {
    /// Base opcode for indirect commands. Scene and group commands
    /// occupy sixteen consecutive opcodes starting here.
    pub fn opcode(self) -> Option<u8> {
        let op = match self {
            Off => 0x00,
            Up => 0x01,
            Down => 0x02,
            StepUp => 0x03,
            StepDown => 0x04,
            RecallMaxLevel => 0x05,
            RecallMinLevel => 0x06,
            StepDownAndOff => 0x07,
            OnAndStepUp => 0x08,
            EnableDapcSequence => 0x09,
            GoToLastActiveLevel => 0x0a,
            GoToScene => 0x10,
            Reset => 0x20,
            StoreActualLevelInDtr => 0x21,
            StoreDtrAsMaxLevel => 0x2a,
            StoreDtrAsMinLevel => 0x2b,
            StoreDtrAsSystemFailureLevel => 0x2c,
            StoreDtrAsPowerOnLevel => 0x2d,
            StoreDtrAsFadeTime => 0x2e,
            StoreDtrAsFadeRate => 0x2f,
            StoreDtrAsScene => 0x40,
            RemoveScene => 0x50,
            AddToGroup => 0x60,
            RemoveFromGroup => 0x70,
            StoreDtrAsShortAddress => 0x80,
            QueryStatus => 0x90,
            QueryGearPresent => 0x91,
            QueryLampFailure => 0x92,
            QueryLampPowerOn => 0x93,
            QueryLimitError => 0x94,
            QueryResetState => 0x95,
            QueryMissingShortAddress => 0x96,
            QueryVersionNumber => 0x97,
            QueryContentDtr => 0x98,
            QueryDeviceType => 0x99,
            QueryPhysicalMinLevel => 0x9a,
            QueryPowerFailure => 0x9b,
            QueryActualLevel => 0xa0,
            QueryMaxLevel => 0xa1,
            QueryMinLevel => 0xa2,
            QueryPowerOnLevel => 0xa3,
            QuerySystemFailureLevel => 0xa4,
            QueryFadeTimeAndRate => 0xa5,
            QuerySceneLevel => 0xb0,
            QueryGroups0_7 => 0xc0,
            QueryGroups8_15 => 0xc1,
            QueryRandomAddressH => 0xc2,
            QueryRandomAddressM => 0xc3,
            QueryRandomAddressL => 0xc4,
            ReadMemoryLocation => 0xc5,
            ReferenceSystemPower => 0xe0,
            EnableCurrentProtector => 0xe1,
            DisableCurrentProtector => 0xe2,
            SetDimmingCurve => 0xe3,
            StoreDtrAsFastFadeTime => 0xe4,
            QueryGearType => 0xed,
            QueryDimmingCurve => 0xee,
            QueryPossibleOperatingModes => 0xef,
            QueryFeatures => 0xf0,
            QueryFailStatus => 0xf1,
            QueryShortCircuit => 0xf2,
            QueryOpenCircuit => 0xf3,
            QueryLoadDecrease => 0xf4,
            QueryLoadIncrease => 0xf5,
            QueryCurrentProtectActive => 0xf6,
            QueryThermalShutdown => 0xf7,
            QueryThermalOverload => 0xf8,
            QueryReferenceRunning => 0xf9,
            QueryReferenceMeasurementFailed => 0xfa,
            QueryCurrentProtectorEnable => 0xfb,
            QueryOperatingMode => 0xfc,
            QueryFastFadeTime => 0xfd,
            QueryMinFastFadeTime => 0xfe,
            QueryExtendedVersionNumber => 0xff,
            _ => return None,
        };
        Some(op)
    }

    fn from_exact_opcode(op: u8) -> Option<DaliCommandCode> {
        let code = match op {
            0x00 => Off,
            0x01 => Up,
            0x02 => Down,
            0x03 => StepUp,
            0x04 => StepDown,
            0x05 => RecallMaxLevel,
            0x06 => RecallMinLevel,
            0x07 => StepDownAndOff,
            0x08 => OnAndStepUp,
            0x09 => EnableDapcSequence,
            0x0a => GoToLastActiveLevel,
            0x20 => Reset,
            0x21 => StoreActualLevelInDtr,
            0x2a => StoreDtrAsMaxLevel,
            0x2b => StoreDtrAsMinLevel,
            0x2c => StoreDtrAsSystemFailureLevel,
            0x2d => StoreDtrAsPowerOnLevel,
            0x2e => StoreDtrAsFadeTime,
            0x2f => StoreDtrAsFadeRate,
            0x80 => StoreDtrAsShortAddress,
            0x90 => QueryStatus,
            0x91 => QueryGearPresent,
            0x92 => QueryLampFailure,
            0x93 => QueryLampPowerOn,
            0x94 => QueryLimitError,
            0x95 => QueryResetState,
            0x96 => QueryMissingShortAddress,
            0x97 => QueryVersionNumber,
            0x98 => QueryContentDtr,
            0x99 => QueryDeviceType,
            0x9a => QueryPhysicalMinLevel,
            0x9b => QueryPowerFailure,
            0xa0 => QueryActualLevel,
            0xa1 => QueryMaxLevel,
            0xa2 => QueryMinLevel,
            0xa3 => QueryPowerOnLevel,
            0xa4 => QuerySystemFailureLevel,
            0xa5 => QueryFadeTimeAndRate,
            0xc0 => QueryGroups0_7,
            0xc1 => QueryGroups8_15,
            0xc2 => QueryRandomAddressH,
            0xc3 => QueryRandomAddressM,
            0xc4 => QueryRandomAddressL,
            0xc5 => ReadMemoryLocation,
            0xe0 => ReferenceSystemPower,
            0xe1 => EnableCurrentProtector,
            0xe2 => DisableCurrentProtector,
            0xe3 => SetDimmingCurve,
            0xe4 => StoreDtrAsFastFadeTime,
            0xed => QueryGearType,
            0xee => QueryDimmingCurve,
            0xef => QueryPossibleOperatingModes,
            0xf0 => QueryFeatures,
            0xf1 => QueryFailStatus,
            0xf2 => QueryShortCircuit,
            0xf3 => QueryOpenCircuit,
            0xf4 => QueryLoadDecrease,
            0xf5 => QueryLoadIncrease,
            0xf6 => QueryCurrentProtectActive,
            0xf7 => QueryThermalShutdown,
            0xf8 => QueryThermalOverload,
            0xf9 => QueryReferenceRunning,
            0xfa => QueryReferenceMeasurementFailed,
            0xfb => QueryCurrentProtectorEnable,
            0xfc => QueryOperatingMode,
            0xfd => QueryFastFadeTime,
            0xfe => QueryMinFastFadeTime,
            0xff => QueryExtendedVersionNumber,
            _ => return None,
        };
        Some(code)
    }

    /// Recover an indirect command from its opcode byte, unfolding the
    /// scene or group number for the commands that carry one there.
    pub fn from_opcode(op: u8) -> Option<(DaliCommandCode, Option<u8>)> {
        match op {
            0x10..=0x1f => Some((GoToScene, Some(op & 0x0f))),
            0x40..=0x4f => Some((StoreDtrAsScene, Some(op & 0x0f))),
            0x50..=0x5f => Some((RemoveScene, Some(op & 0x0f))),
            0x60..=0x6f => Some((AddToGroup, Some(op & 0x0f))),
            0x70..=0x7f => Some((RemoveFromGroup, Some(op & 0x0f))),
            0xb0..=0xbf => Some((QuerySceneLevel, Some(op & 0x0f))),
            _ => Self::from_exact_opcode(op).map(|c| (c, None)),
        }
    }

    /// High byte of a special command frame. The DALI-reserved pattern
    /// 0b101xxxx1 / 0b110xxxx1 marks these on the bus.
    pub fn special_opcode(self) -> Option<u8> {
        let op = match self {
            Terminate => 0xa1,
            DataTransferRegister => 0xa3,
            Initialize => 0xa5,
            Randomize => 0xa7,
            Compare => 0xa9,
            Withdraw => 0xab,
            Ping => 0xaf,
            SearchAddressH => 0xb1,
            SearchAddressM => 0xb3,
            SearchAddressL => 0xb5,
            ProgramShortAddress => 0xb7,
            VerifyShortAddress => 0xb9,
            QueryShortAddress => 0xbb,
            PhysicalSelection => 0xbd,
            EnableDeviceOfType => 0xc1,
            SetDtr1 => 0xc3,
            SetDtr2 => 0xc5,
            WriteMemoryLocation => 0xc7,
            _ => return None,
        };
        Some(op)
    }

    pub fn from_special_opcode(op: u8) -> Option<DaliCommandCode> {
        let code = match op {
            0xa1 => Terminate,
            0xa3 => DataTransferRegister,
            0xa5 => Initialize,
            0xa7 => Randomize,
            0xa9 => Compare,
            0xab => Withdraw,
            0xaf => Ping,
            0xb1 => SearchAddressH,
            0xb3 => SearchAddressM,
            0xb5 => SearchAddressL,
            0xb7 => ProgramShortAddress,
            0xb9 => VerifyShortAddress,
            0xbb => QueryShortAddress,
            0xbd => PhysicalSelection,
            0xc1 => EnableDeviceOfType,
            0xc3 => SetDtr1,
            0xc5 => SetDtr2,
            0xc7 => WriteMemoryLocation,
            _ => return None,
        };
        Some(code)
    }

    pub fn is_special(self) -> bool {
        self.special_opcode().is_some()
    }

    /// Value contract for the command's own payload, enforced at
    /// construction.
    pub fn param_type(self) -> DaliValueType {
        match self {
            Dapc => DaliValueType::DataByte,
            GoToScene | StoreDtrAsScene | RemoveScene | QuerySceneLevel => DaliValueType::Scene,
            AddToGroup | RemoveFromGroup => DaliValueType::Group,
            DataTransferRegister | Initialize | EnableDeviceOfType | SetDtr1 | SetDtr2
            | WriteMemoryLocation => DaliValueType::DataByte,
            SearchAddressH | SearchAddressM | SearchAddressL => DaliValueType::Random,
            ProgramShortAddress | VerifyShortAddress => DaliValueType::Short,
            _ => DaliValueType::Null,
        }
    }

    /// Interpretation of the backward frame this command provokes.
    /// `Null` means no answer is expected at all.
    pub fn value_type(self) -> DaliValueType {
        match self {
            Compare | VerifyShortAddress | QueryGearPresent | QueryLampFailure
            | QueryLampPowerOn | QueryLimitError | QueryResetState | QueryMissingShortAddress
            | QueryPowerFailure | QueryShortCircuit | QueryOpenCircuit | QueryLoadDecrease
            | QueryLoadIncrease | QueryCurrentProtectActive | QueryThermalShutdown
            | QueryThermalOverload | QueryReferenceRunning | QueryReferenceMeasurementFailed
            | QueryCurrentProtectorEnable => DaliValueType::Boolean,
            QueryStatus | QueryVersionNumber | QueryContentDtr | QueryDeviceType
            | QueryPhysicalMinLevel | QueryActualLevel | QueryMaxLevel | QueryMinLevel
            | QueryPowerOnLevel | QuerySystemFailureLevel | QueryFadeTimeAndRate
            | QuerySceneLevel | QueryGroups0_7 | QueryGroups8_15 | ReadMemoryLocation
            | QueryGearType | QueryDimmingCurve | QueryPossibleOperatingModes | QueryFeatures
            | QueryFailStatus | QueryOperatingMode | QueryFastFadeTime | QueryMinFastFadeTime => {
                DaliValueType::DataByte
            }
            QueryRandomAddressH | QueryRandomAddressM | QueryRandomAddressL => {
                DaliValueType::Random
            }
            QueryShortAddress => DaliValueType::Short,
            QueryExtendedVersionNumber | WriteMemoryLocation => DaliValueType::DataByteAndFalse,
            _ => DaliValueType::Null,
        }
    }

    pub fn expects_answer(self) -> bool {
        self.value_type() != DaliValueType::Null
    }

    /// Commands the bus requires to be transmitted twice in succession.
    pub fn sends_twice(self) -> bool {
        matches!(self, Initialize | Randomize)
    }
}

/// A validated DALI forward frame. Constructed once, immutable, and
/// always encodable to its 16-bit wire word.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DaliCommand {
    code: DaliCommandCode,
    address: Option<Address>,
    value: Option<u32>,
}

impl DaliCommand {
    pub fn new(
        code: DaliCommandCode,
        address: Option<Address>,
        value: Option<u32>,
    ) -> Result<DaliCommand, CommandError> {
        if code.is_special() {
            if address.is_some() {
                return Err(CommandError::UnexpectedAddress);
            }
        } else if address.is_none() {
            return Err(CommandError::MissingAddress);
        }
        let range = match code.param_type() {
            DaliValueType::Null => {
                if value.is_some() {
                    return Err(CommandError::UnexpectedValue);
                }
                None
            }
            DaliValueType::DataByte if code == Dapc => Some((0, 254)),
            DaliValueType::DataByte => Some((0, 255)),
            DaliValueType::Scene | DaliValueType::Group => Some((0, 15)),
            DaliValueType::Short => Some((0, 63)),
            DaliValueType::Random => Some((0, 0xffffff)),
            // Boolean and friends only describe backward frames
            _ => None,
        };
        if let Some((min, max)) = range {
            match value {
                None => return Err(CommandError::MissingValue),
                Some(v) if v < min || v > max => {
                    return Err(CommandError::ValueOutOfRange { min, max })
                }
                Some(_) => {}
            }
        }
        Ok(DaliCommand {
            code,
            address,
            value,
        })
    }

    /// Direct arc power from a relative brightness, clamped to the
    /// 0..=254 level range the bus allows.
    pub fn dapc(address: Address, brightness: f64) -> DaliCommand {
        let level = (brightness * 254.0).floor().clamp(0.0, 254.0) as u32;
        DaliCommand {
            code: Dapc,
            address: Some(address),
            value: Some(level),
        }
    }

    /// Direct arc power with an explicit level byte.
    pub fn level(address: Address, level: u8) -> Result<DaliCommand, CommandError> {
        DaliCommand::new(Dapc, Some(address), Some(level as u32))
    }

    pub fn off(address: Address) -> DaliCommand {
        DaliCommand {
            code: Off,
            address: Some(address),
            value: None,
        }
    }

    /// Commissioning command. The value is ignored for codes that take
    /// no payload, mirroring how the adapter expects a zero byte there.
    pub fn special(code: DaliCommandCode, value: u32) -> Result<DaliCommand, CommandError> {
        let value = match code.param_type() {
            DaliValueType::Null => None,
            _ => Some(value),
        };
        DaliCommand::new(code, None, value)
    }

    pub fn code(&self) -> DaliCommandCode {
        self.code
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn value(&self) -> Option<u32> {
        self.value
    }

    /// The 16-bit word as transmitted on the bus, high byte first.
    pub fn bytecode(&self) -> u16 {
        let value = self.value.unwrap_or(0);
        if let Some(op) = self.code.special_opcode() {
            let low = match self.code.param_type() {
                DaliValueType::Short => ((value as u8) << 1) | 1,
                DaliValueType::Random => match self.code {
                    SearchAddressH => (value >> 16) as u8,
                    SearchAddressM => (value >> 8) as u8,
                    _ => value as u8,
                },
                DaliValueType::Null => 0,
                _ => value as u8,
            };
            return ((op as u16) << 8) | low as u16;
        }
        let addr = match self.address {
            Some(a) => a.to_bus_addr(),
            None => 0,
        };
        match self.code {
            Dapc => ((addr as u16) << 8) | value as u16,
            code => {
                let op = code.opcode().unwrap_or(0);
                let low = match code.param_type() {
                    DaliValueType::Scene | DaliValueType::Group => op | (value as u8 & 0x0f),
                    _ => op,
                };
                (((addr | 1) as u16) << 8) | low as u16
            }
        }
    }

    /// Decode a 16-bit bus word. The address-type bits are classified
    /// first; the special-command pattern wins over group addressing.
    pub fn from_bytecode(word: u16) -> Result<DaliCommand, CommandError> {
        let high = (word >> 8) as u8;
        let low = word as u8;
        let malformed = CommandError::MalformedBytecode(word);

        if (0xa1..=0xc7).contains(&high) && high & 1 == 1 {
            let code = DaliCommandCode::from_special_opcode(high).ok_or(malformed)?;
            let value = match code.param_type() {
                DaliValueType::Null => {
                    if low != 0 {
                        return Err(malformed);
                    }
                    None
                }
                DaliValueType::Short => {
                    if low & 1 != 1 || low & 0x80 != 0 {
                        return Err(malformed);
                    }
                    Some(((low >> 1) & 0x3f) as u32)
                }
                DaliValueType::Random => Some(match code {
                    SearchAddressH => (low as u32) << 16,
                    SearchAddressM => (low as u32) << 8,
                    _ => low as u32,
                }),
                _ => Some(low as u32),
            };
            return DaliCommand::new(code, None, value).map_err(|_| malformed);
        }

        if high & 1 == 0 {
            let address = Address::from_bus_addr(high).map_err(|_| malformed)?;
            return DaliCommand::new(Dapc, Some(address), Some(low as u32)).map_err(|_| malformed);
        }

        let address = Address::from_bus_addr(high & 0xfe).map_err(|_| malformed)?;
        let (code, folded) = DaliCommandCode::from_opcode(low).ok_or(malformed)?;
        DaliCommand::new(code, Some(address), folded.map(u32::from)).map_err(|_| malformed)
    }
}

#[cfg(test)]
mod test {
    use super::DaliCommandCode::*;
    use super::{CommandError, DaliCommand, DaliValueType};
    use crate::base::address::{Address, Group, Short};

    fn roundtrip(cmd: DaliCommand) {
        let word = cmd.bytecode();
        let back = DaliCommand::from_bytecode(word).unwrap();
        assert_eq!(back, cmd, "bytecode {:#06x}", word);
    }

    #[test]
    fn dapc_roundtrip() {
        let cmd = DaliCommand::dapc(Address::Broadcast, 0.5);
        assert_eq!(cmd.value(), Some(127));
        assert_eq!(cmd.bytecode(), 0xfe7f);
        roundtrip(cmd);

        let cmd = DaliCommand::level(Short::new(3).into(), 200).unwrap();
        assert_eq!(cmd.bytecode(), 0x06c8);
        roundtrip(cmd);

        let cmd = DaliCommand::level(Group::new(5).into(), 1).unwrap();
        assert_eq!(cmd.bytecode(), 0x8a01);
        roundtrip(cmd);
    }

    #[test]
    fn dapc_decoded_from_example() {
        let cmd = DaliCommand::from_bytecode(0xfe7f).unwrap();
        assert_eq!(cmd.code(), Dapc);
        assert_eq!(cmd.address(), Some(Address::Broadcast));
        assert_eq!(cmd.value(), Some(127));
    }

    #[test]
    fn indirect_roundtrip() {
        roundtrip(DaliCommand::off(Short::new(0).into()));
        roundtrip(DaliCommand::new(QueryStatus, Some(Short::new(63).into()), None).unwrap());
        roundtrip(DaliCommand::new(Reset, Some(Address::Broadcast), None).unwrap());
        roundtrip(DaliCommand::new(QueryActualLevel, Some(Group::new(15).into()), None).unwrap());
        roundtrip(
            DaliCommand::new(QueryExtendedVersionNumber, Some(Short::new(1).into()), None).unwrap(),
        );
    }

    #[test]
    fn scene_and_group_folding() {
        let cmd = DaliCommand::new(GoToScene, Some(Address::Broadcast), Some(5)).unwrap();
        assert_eq!(cmd.bytecode(), 0xff15);
        roundtrip(cmd);

        let cmd = DaliCommand::new(AddToGroup, Some(Short::new(2).into()), Some(15)).unwrap();
        assert_eq!(cmd.bytecode(), 0x056f);
        roundtrip(cmd);

        roundtrip(DaliCommand::new(StoreDtrAsScene, Some(Address::Broadcast), Some(0)).unwrap());
        roundtrip(DaliCommand::new(RemoveScene, Some(Short::new(9).into()), Some(3)).unwrap());
        roundtrip(DaliCommand::new(RemoveFromGroup, Some(Group::new(2).into()), Some(7)).unwrap());
        roundtrip(DaliCommand::new(QuerySceneLevel, Some(Short::new(4).into()), Some(12)).unwrap());
    }

    #[test]
    fn scene_range_enforced() {
        for code in [GoToScene, StoreDtrAsScene, RemoveScene, QuerySceneLevel] {
            assert_eq!(
                DaliCommand::new(code, Some(Address::Broadcast), Some(16)),
                Err(CommandError::ValueOutOfRange { min: 0, max: 15 })
            );
            assert!(DaliCommand::new(code, Some(Address::Broadcast), Some(15)).is_ok());
        }
    }

    #[test]
    fn value_contract_enforced() {
        assert_eq!(
            DaliCommand::new(Off, Some(Address::Broadcast), Some(1)),
            Err(CommandError::UnexpectedValue)
        );
        assert_eq!(
            DaliCommand::new(GoToScene, Some(Address::Broadcast), None),
            Err(CommandError::MissingValue)
        );
        assert_eq!(
            DaliCommand::new(Dapc, Some(Address::Broadcast), Some(255)),
            Err(CommandError::ValueOutOfRange { min: 0, max: 254 })
        );
        assert_eq!(
            DaliCommand::new(QueryStatus, None, None),
            Err(CommandError::MissingAddress)
        );
        assert_eq!(
            DaliCommand::new(Compare, Some(Address::Broadcast), None),
            Err(CommandError::UnexpectedAddress)
        );
        assert_eq!(
            DaliCommand::new(ProgramShortAddress, None, Some(64)),
            Err(CommandError::ValueOutOfRange { min: 0, max: 63 })
        );
    }

    #[test]
    fn special_roundtrip() {
        let cmd = DaliCommand::special(Terminate, 0).unwrap();
        assert_eq!(cmd.bytecode(), 0xa100);
        roundtrip(cmd);

        let cmd = DaliCommand::special(Initialize, 0).unwrap();
        assert_eq!(cmd.bytecode(), 0xa500);
        roundtrip(cmd);

        let cmd = DaliCommand::special(ProgramShortAddress, 10).unwrap();
        assert_eq!(cmd.bytecode(), 0xb715);
        roundtrip(cmd);

        let cmd = DaliCommand::special(VerifyShortAddress, 63).unwrap();
        assert_eq!(cmd.bytecode(), 0xb97f);
        roundtrip(cmd);

        roundtrip(DaliCommand::special(DataTransferRegister, 0xcc).unwrap());
        roundtrip(DaliCommand::special(Compare, 0).unwrap());
        roundtrip(DaliCommand::special(Withdraw, 0).unwrap());
    }

    #[test]
    fn search_address_slices() {
        let cmd = DaliCommand::special(SearchAddressH, 0x123456).unwrap();
        assert_eq!(cmd.bytecode(), 0xb112);
        let cmd = DaliCommand::special(SearchAddressM, 0x123456).unwrap();
        assert_eq!(cmd.bytecode(), 0xb334);
        let cmd = DaliCommand::special(SearchAddressL, 0x123456).unwrap();
        assert_eq!(cmd.bytecode(), 0xb556);

        // Each code recovers the byte into its own slice position
        roundtrip(DaliCommand::special(SearchAddressH, 0x120000).unwrap());
        roundtrip(DaliCommand::special(SearchAddressM, 0x3400).unwrap());
        roundtrip(DaliCommand::special(SearchAddressL, 0x56).unwrap());
    }

    #[test]
    fn malformed_bytecodes_rejected() {
        // Reserved gap in the special opcode space
        assert!(DaliCommand::from_bytecode(0xad00).is_err());
        // Special command with a payload where none is allowed
        assert!(DaliCommand::from_bytecode(0xa101).is_err());
        // Address byte outside short/group/broadcast ranges
        assert!(DaliCommand::from_bytecode(0xe100).is_err());
        // Unassigned indirect opcode
        assert!(DaliCommand::from_bytecode(0x0330).is_err());
        // DAPC with the reserved MASK level
        assert!(DaliCommand::from_bytecode(0xfeff).is_err());
    }

    #[test]
    fn value_types() {
        assert_eq!(QueryStatus.value_type(), DaliValueType::DataByte);
        assert_eq!(QueryLampFailure.value_type(), DaliValueType::Boolean);
        assert_eq!(Compare.value_type(), DaliValueType::Boolean);
        assert_eq!(QueryShortAddress.value_type(), DaliValueType::Short);
        assert_eq!(QueryRandomAddressM.value_type(), DaliValueType::Random);
        assert_eq!(
            QueryExtendedVersionNumber.value_type(),
            DaliValueType::DataByteAndFalse
        );
        assert_eq!(Off.value_type(), DaliValueType::Null);
        assert!(Initialize.sends_twice());
        assert!(Randomize.sends_twice());
        assert!(!Compare.sends_twice());
    }
}
