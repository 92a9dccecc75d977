use num_enum::{IntoPrimitive, TryFromPrimitive};

/// A bytecode instruction. Operands follow the opcode word inline; see
/// [`Opcode::operand_words`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum Opcode {
    PushConstant,
    /// Two words holding the little-endian halves of an `f64`.
    PushNumber,
    PushBool,
    Pop,

    ToNumber,
    ToString,
    ToBoolean,

    PushVar,
    SetVar,
    ChangeVar,
    /// `handle, visible`
    VarWatch,

    /// Pushes the list joined into a string.
    PushList,
    ListAdd,
    ListDelete,
    ListDeleteAll,
    ListInsert,
    ListReplace,
    ListItem,
    ListItemNum,
    ListLength,
    ListContains,
    /// `handle, visible`
    ListWatch,

    /// Pushes a fresh local-state record, saving the current one.
    Save,
    Restore,
    PushLocal,
    SetLocal,
    DecLocal,

    PushArg,
    PushArgNumber,
    PushArgBoolean,

    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Round,
    MathOp,
    Random,
    Lt,
    Gt,
    Equals,
    NumLess,
    NumGreater,
    NumEquals,
    And,
    Or,
    Not,
    Join,
    LetterOf,
    Length,
    Contains,

    Jump,
    JumpIfFalse,
    JumpIfTrue,
    /// Resume at a label: inline while warped, otherwise next pass.
    Queue,
    /// Resume at a label on the next pass regardless of warp.
    ForceQueue,
    End,
    EndCall,
    /// `proc code constant, argument count, return label`
    Call,

    Broadcast,
    BroadcastAndWait,
    Running,
    SceneChanged,

    Stop,
    DeleteClone,
    /// Pushes whether the wait started at local `n` has lasted the duration
    /// stored in local `n + 1`.
    WaitElapsed,
    PushNow,
    Visual,
    CallBuiltin,
}

impl Opcode {
    pub const fn operand_words(self) -> usize {
        use Opcode::*;

        match self {
            PushNumber | VarWatch | ListWatch => 2,
            Call => 3,
            PushConstant | PushBool | PushVar | SetVar | ChangeVar | PushList | ListAdd
            | ListDelete | ListDeleteAll | ListInsert | ListReplace | ListItem | ListItemNum
            | ListLength | ListContains | PushLocal | SetLocal | DecLocal | PushArg
            | PushArgNumber | PushArgBoolean | MathOp | Jump | JumpIfFalse | JumpIfTrue
            | Queue | ForceQueue | Stop | WaitElapsed | Visual | CallBuiltin => 1,
            _ => 0,
        }
    }

    /// Whether control never falls through to the next instruction. Ops
    /// that only end the invocation sometimes (`Stop`, `Broadcast`) are not
    /// terminators.
    pub const fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Jump
                | Opcode::Queue
                | Opcode::ForceQueue
                | Opcode::End
                | Opcode::EndCall
                | Opcode::Call
        )
    }

    pub const fn label_operand(self) -> Option<usize> {
        match self {
            Opcode::Queue | Opcode::ForceQueue => Some(0),
            Opcode::Call => Some(2),
            _ => None,
        }
    }

    pub const fn jump_operand(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::JumpIfFalse | Opcode::JumpIfTrue)
    }
}

/// `Stop` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum StopMode {
    All,
    ThisScript,
    OtherScripts,
}

/// How a statement affects what is on screen. Ordered by strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum VisualTier {
    None,
    /// Visible only when the pen is down or the sprite is shown.
    Drawing,
    Visible,
    Always,
}

/// `MathOp` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum MathFunction {
    Abs,
    Floor,
    Ceiling,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Ln,
    Log,
    Exp,
    Pow10,
}

impl MathFunction {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceiling" => Self::Ceiling,
            "sqrt" => Self::Sqrt,
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "ln" => Self::Ln,
            "log" => Self::Log,
            "e ^" => Self::Exp,
            "10 ^" => Self::Pow10,
            _ => return None,
        })
    }

    pub fn apply(self, x: f64) -> f64 {
        use std::f64::consts::PI;

        match self {
            Self::Abs => x.abs(),
            Self::Floor => x.floor(),
            Self::Ceiling => x.ceil(),
            Self::Sqrt => x.sqrt(),
            Self::Sin => round_trig((x * PI / 180.0).sin()),
            Self::Cos => round_trig((x * PI / 180.0).cos()),
            Self::Tan => tan_degrees(x),
            Self::Asin => x.asin() * 180.0 / PI,
            Self::Acos => x.acos() * 180.0 / PI,
            Self::Atan => x.atan() * 180.0 / PI,
            Self::Ln => x.ln(),
            Self::Log => x.log10(),
            Self::Exp => x.exp(),
            Self::Pow10 => 10f64.powf(x),
        }
    }
}

fn round_trig(x: f64) -> f64 {
    (x * 1e10).round() / 1e10
}

fn tan_degrees(x: f64) -> f64 {
    let angle = x.rem_euclid(360.0);
    if angle == 90.0 {
        f64::INFINITY
    } else if angle == 270.0 {
        f64::NEG_INFINITY
    } else {
        round_trig((angle * std::f64::consts::PI / 180.0).tan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_words() {
        let word: u32 = Opcode::WaitElapsed.into();
        assert_eq!(Opcode::try_from(word), Ok(Opcode::WaitElapsed));
        assert!(Opcode::try_from(u32::MAX).is_err());
    }

    #[test]
    fn trig_in_degrees() {
        assert_eq!(MathFunction::Sin.apply(30.0), 0.5);
        assert_eq!(MathFunction::Cos.apply(90.0), 0.0);
        assert_eq!(MathFunction::Tan.apply(-270.0), f64::INFINITY);
        assert_eq!(MathFunction::parse("10 ^").map(|f| f.apply(2.0)), Some(100.0));
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(VisualTier::Always > VisualTier::Visible);
        assert!(VisualTier::Drawing > VisualTier::None);
    }
}
