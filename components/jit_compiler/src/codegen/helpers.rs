//! Host routines generated code imports by name.

/// A runtime helper callable from generated code.
///
/// Every helper takes and returns 64-bit words; values use the tagged layout,
/// indices and addresses are plain integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Helper {
    /// `(value) -> value`
    Print,
    /// `(op, left, right) -> value`
    Binary,
    /// `(operand) -> value`
    Negate,
    /// `(left, right) -> bool`
    ValuesEqual,
    /// `(slot) -> value`
    GlobalGet,
    /// `(slot, value) -> value`
    GlobalSet,
    /// `(slot, value) -> nil`
    GlobalDefine,
    /// `(value) -> cell`
    NewCell,
    /// `(cell) -> value`
    CellGet,
    /// `(cell, value) -> value`
    CellSet,
    /// `(closure, index) -> cell`
    ClosureCell,
    /// `(prototype, entry, cells, count) -> closure`
    MakeClosure,
    /// `(callee, argc, target) -> entry`, 0 on error
    PrepareCall,
    /// `() -> nil`
    StackOverflow,
    /// `(object, name, site) -> value`
    GetProperty,
    /// `(object, name, value, site) -> value`
    SetProperty,
    /// `(name, has_superclass, superclass) -> class`
    NewClass,
    /// `(class, name, method) -> nil`
    AddMethod,
    /// `(superclass, receiver, name) -> bound method`
    GetSuper,
}

impl Helper {
    /// Every helper.
    pub const ALL: [Helper; 19] = [
        Helper::Print,
        Helper::Binary,
        Helper::Negate,
        Helper::ValuesEqual,
        Helper::GlobalGet,
        Helper::GlobalSet,
        Helper::GlobalDefine,
        Helper::NewCell,
        Helper::CellGet,
        Helper::CellSet,
        Helper::ClosureCell,
        Helper::MakeClosure,
        Helper::PrepareCall,
        Helper::StackOverflow,
        Helper::GetProperty,
        Helper::SetProperty,
        Helper::NewClass,
        Helper::AddMethod,
        Helper::GetSuper,
    ];

    /// Symbol the helper is registered under.
    pub fn symbol(self) -> &'static str {
        match self {
            Helper::Print => "elx_print",
            Helper::Binary => "elx_binary",
            Helper::Negate => "elx_negate",
            Helper::ValuesEqual => "elx_values_equal",
            Helper::GlobalGet => "elx_global_get",
            Helper::GlobalSet => "elx_global_set",
            Helper::GlobalDefine => "elx_global_define",
            Helper::NewCell => "elx_new_cell",
            Helper::CellGet => "elx_cell_get",
            Helper::CellSet => "elx_cell_set",
            Helper::ClosureCell => "elx_closure_cell",
            Helper::MakeClosure => "elx_make_closure",
            Helper::PrepareCall => "elx_prepare_call",
            Helper::StackOverflow => "elx_stack_overflow",
            Helper::GetProperty => "elx_get_property",
            Helper::SetProperty => "elx_set_property",
            Helper::NewClass => "elx_new_class",
            Helper::AddMethod => "elx_add_method",
            Helper::GetSuper => "elx_get_super",
        }
    }

    /// Parameter count.
    pub fn arity(self) -> usize {
        match self {
            Helper::StackOverflow => 0,
            Helper::Print
            | Helper::Negate
            | Helper::GlobalGet
            | Helper::NewCell
            | Helper::CellGet => 1,
            Helper::ValuesEqual
            | Helper::GlobalSet
            | Helper::GlobalDefine
            | Helper::CellSet
            | Helper::ClosureCell => 2,
            Helper::Binary
            | Helper::PrepareCall
            | Helper::GetProperty
            | Helper::NewClass
            | Helper::AddMethod
            | Helper::GetSuper => 3,
            Helper::MakeClosure | Helper::SetProperty => 4,
        }
    }

    /// Whether the helper can raise a runtime error, after which generated
    /// code must test the pending flag.
    pub fn fallible(self) -> bool {
        !matches!(
            self,
            Helper::Print
                | Helper::ValuesEqual
                | Helper::GlobalDefine
                | Helper::CellGet
                | Helper::CellSet
                | Helper::ClosureCell
                | Helper::AddMethod
                // Reports failure through its return value instead.
                | Helper::PrepareCall
        )
    }
}
