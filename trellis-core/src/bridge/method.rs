//! Bridge Method Identifiers
//!
//! Every call crossing the boundary names one of these methods. The set is
//! closed on purpose: dispatch is an exhaustive match over an enum instead
//! of runtime string comparison, and the integer ids are stable so the
//! native side can switch on them.

/// The closed set of bridge methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeMethod {
    CreateView,
    InsertSubView,
    RemoveView,
    SetViewProp,
    SetEvent,
    CallViewMethod,
    CallModuleMethod,
    CreateShadow,
    RemoveShadow,
    SetShadowProp,
    CallShadowMethod,
    CalculateLayout,
}

impl BridgeMethod {
    /// Every method, in id order. Handy for dispatch-table tests.
    pub const ALL: [BridgeMethod; 12] = [
        BridgeMethod::CreateView,
        BridgeMethod::InsertSubView,
        BridgeMethod::RemoveView,
        BridgeMethod::SetViewProp,
        BridgeMethod::SetEvent,
        BridgeMethod::CallViewMethod,
        BridgeMethod::CallModuleMethod,
        BridgeMethod::CreateShadow,
        BridgeMethod::RemoveShadow,
        BridgeMethod::SetShadowProp,
        BridgeMethod::CallShadowMethod,
        BridgeMethod::CalculateLayout,
    ];

    /// The stable integer id carried on the wire.
    pub fn id(self) -> u32 {
        match self {
            BridgeMethod::CreateView => 1,
            BridgeMethod::InsertSubView => 2,
            BridgeMethod::RemoveView => 3,
            BridgeMethod::SetViewProp => 4,
            BridgeMethod::SetEvent => 5,
            BridgeMethod::CallViewMethod => 6,
            BridgeMethod::CallModuleMethod => 7,
            BridgeMethod::CreateShadow => 8,
            BridgeMethod::RemoveShadow => 9,
            BridgeMethod::SetShadowProp => 10,
            BridgeMethod::CallShadowMethod => 11,
            BridgeMethod::CalculateLayout => 12,
        }
    }

    /// Resolve an integer id back to a method.
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(BridgeMethod::CreateView),
            2 => Some(BridgeMethod::InsertSubView),
            3 => Some(BridgeMethod::RemoveView),
            4 => Some(BridgeMethod::SetViewProp),
            5 => Some(BridgeMethod::SetEvent),
            6 => Some(BridgeMethod::CallViewMethod),
            7 => Some(BridgeMethod::CallModuleMethod),
            8 => Some(BridgeMethod::CreateShadow),
            9 => Some(BridgeMethod::RemoveShadow),
            10 => Some(BridgeMethod::SetShadowProp),
            11 => Some(BridgeMethod::CallShadowMethod),
            12 => Some(BridgeMethod::CalculateLayout),
            _ => None,
        }
    }

    /// Module calls resolve through the pager's module table.
    pub fn targets_module(self) -> bool {
        matches!(self, BridgeMethod::CallModuleMethod)
    }

    /// Shadow/layout calls resolve by (pager, view ref).
    pub fn targets_shadow(self) -> bool {
        matches!(
            self,
            BridgeMethod::CreateShadow
                | BridgeMethod::RemoveShadow
                | BridgeMethod::SetShadowProp
                | BridgeMethod::CallShadowMethod
                | BridgeMethod::CalculateLayout
        )
    }

    /// View-tree operations are forwarded to the host's render delegate.
    pub fn targets_view_tree(self) -> bool {
        !self.targets_module() && !self.targets_shadow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_exhaustively() {
        for method in BridgeMethod::ALL {
            assert_eq!(BridgeMethod::from_id(method.id()), Some(method));
        }
        assert_eq!(BridgeMethod::from_id(0), None);
        assert_eq!(BridgeMethod::from_id(99), None);
    }

    #[test]
    fn every_method_has_exactly_one_target() {
        for method in BridgeMethod::ALL {
            let targets = [
                method.targets_module(),
                method.targets_shadow(),
                method.targets_view_tree(),
            ];
            assert_eq!(targets.iter().filter(|t| **t).count(), 1, "{method:?}");
        }
    }
}
