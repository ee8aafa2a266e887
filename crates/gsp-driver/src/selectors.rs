//! Selector lists: a short ordered list of locator strategies per UI
//! element, tried in order until one resolves within its timeout.
//!
//! spec.md §9 asks for this as an explicit, unit-testable data structure
//! in place of the original's ad-hoc try/except selector chains. Each
//! `Locator` resolves to a concrete lookup the `browser` module knows how
//! to run; `data-testid` is preferred, then ARIA role/accessible name,
//! then visible text, with a generic CSS selector as the last resort.

/// One way to find an element on the page.
#[derive(Debug, Clone, Copy)]
pub enum Locator {
    /// `[data-testid="..."]` — most robust, survives copy/style changes.
    TestId(&'static str),
    /// ARIA role plus an accessible-name substring, e.g. `("button", "Confirmar")`.
    Role(&'static str, &'static str),
    /// Visible text substring, matched against `textContent` via a DOM
    /// query evaluated in-page rather than a `find_element` CSS call —
    /// CSS has no "contains text" selector.
    Text(&'static str),
    /// A raw CSS selector, used only when nothing more specific exists.
    Css(&'static str),
}

/// An ordered list of `Locator`s for one logical UI element. The first
/// strategy that resolves within the caller's timeout wins; later entries
/// are not tried once one succeeds.
pub type SelectorList = &'static [Locator];

pub const LOGIN_MODE_COMBOBOX: SelectorList = &[
    Locator::TestId("login-mode-select"),
    Locator::Role("combobox", "Modo de ingreso"),
    Locator::Css("select#login-mode"),
];

pub const LOGIN_CODE_OPTION_TEXT: &str = "Código";

pub const LOGIN_USER_INPUT: SelectorList = &[
    Locator::TestId("login-user-code"),
    Locator::Css("input[name=\"codigo\"]"),
    Locator::Css("#userCode"),
];

pub const LOGIN_PASSWORD_INPUT: SelectorList = &[
    Locator::TestId("login-password"),
    Locator::Css("input[type=\"password\"]"),
    Locator::Css("#password"),
];

pub const LOGIN_SUBMIT_BUTTON: SelectorList = &[
    Locator::TestId("login-submit"),
    Locator::Role("button", "Ingresar"),
    Locator::Css("button[type=\"submit\"]"),
];

pub const IMPERSONATION_READY_LABEL: SelectorList = &[
    Locator::TestId("select-otra-consultora-label"),
    Locator::Role("radio", "otra consultora"),
    Locator::Text("Ingresar por otra consultora"),
];

pub const IMPERSONATION_RADIO: SelectorList = &[
    Locator::TestId("select-otra-consultora-radio"),
    Locator::Role("radio", "otra consultora"),
    Locator::Css("input[type=\"radio\"][value=\"otra\"]"),
];

pub const IMPERSONATION_ACCEPT_BUTTON: SelectorList = &[
    Locator::TestId("select-otra-consultora-accept"),
    Locator::Role("button", "Aceptar"),
    Locator::Text("Aceptar"),
];

pub const CONSULTORA_CODE_INPUT: SelectorList = &[
    Locator::TestId("consultora-code-input"),
    Locator::Css("input[name=\"consultoraCode\"]"),
    Locator::Css("#consultoraCode"),
];

pub const CONSULTORA_SEARCH_BUTTON: SelectorList = &[
    Locator::TestId("consultora-search-button"),
    Locator::Role("button", "Buscar"),
    Locator::Css("button.search-consultora"),
];

pub const CONSULTORA_CONFIRM_BUTTON: SelectorList = &[
    Locator::TestId("consultora-confirm-button"),
    Locator::Role("button", "Confirmar"),
    Locator::Text("Confirmar"),
];

pub const CYCLE_RADIO_GROUP: SelectorList = &[
    Locator::TestId("cycle-radio-group"),
    Locator::Role("radiogroup", "Ciclo"),
    Locator::Css("fieldset.cycle-options"),
];

pub const CYCLE_RADIO_ITEM: SelectorList = &[
    Locator::TestId("cycle-radio-option"),
    Locator::Css("input[type=\"radio\"][name=\"cycle\"]"),
];

pub const CYCLE_ACCEPT_BUTTON: SelectorList = &[
    Locator::TestId("cycle-accept-button"),
    Locator::Role("button", "Aceptar"),
    Locator::Text("Aceptar"),
];

pub const PRODUCT_GRID_LIST: SelectorList = &[
    Locator::TestId("product-grid"),
    Locator::Role("grid", "Productos"),
    Locator::Css("table.product-grid"),
];

pub const IMPORT_BUTTON: SelectorList = &[
    Locator::TestId("import-order-button"),
    Locator::Role("button", "Importar"),
    Locator::Text("Importar pedido"),
];

pub const FILE_INPUT: SelectorList = &[
    Locator::TestId("import-file-input"),
    Locator::Css("input[type=\"file\"]"),
];

pub const EMPTY_CART_BUTTON: SelectorList = &[
    Locator::TestId("empty-cart-button"),
    Locator::Role("button", "Vaciar carrito"),
    Locator::Text("Vaciar carrito"),
];

pub const CART_ROW: SelectorList = &[
    Locator::TestId("cart-row"),
    Locator::Css("tr.cart-item"),
];

pub const CART_ROW_TRASH_BUTTON: SelectorList = &[
    Locator::TestId("cart-row-remove"),
    Locator::Role("button", "Eliminar"),
    Locator::Css("button.remove-item"),
];

pub const CART_ROW_REMOVE_TOAST: SelectorList = &[
    Locator::TestId("toast-success"),
    Locator::Text("eliminado"),
];

/// The four non-deterministic popups the adaptive navigation loop may
/// encounter, in the inspection order spec.md §4.3.1 step 3 mandates.
pub struct PopupDef {
    pub name: &'static str,
    pub detector: SelectorList,
    pub accept: SelectorList,
}

pub const ADAPTIVE_POPUPS: &[PopupDef] = &[
    PopupDef {
        name: "cycle_dialog",
        detector: CYCLE_RADIO_GROUP,
        accept: CYCLE_ACCEPT_BUTTON,
    },
    PopupDef {
        name: "direct_sale_dialog",
        detector: &[
            Locator::TestId("direct-sale-dialog"),
            Locator::Text("venta directa"),
        ],
        accept: &[
            Locator::TestId("direct-sale-dialog-accept"),
            Locator::Role("button", "Aceptar"),
            Locator::Text("Aceptar"),
        ],
    },
    PopupDef {
        name: "listo_popup",
        detector: &[Locator::TestId("listo-popup"), Locator::Text("LISTO")],
        accept: &[
            Locator::TestId("listo-popup-accept"),
            Locator::Role("button", "LISTO"),
            Locator::Text("LISTO"),
        ],
    },
    PopupDef {
        name: "recover_saved_order_dialog",
        detector: &[
            Locator::TestId("recover-order-dialog"),
            Locator::Text("pedido guardado"),
        ],
        // Always delete: spec.md §9 Open Question — no resumable-order
        // use case is expressed anywhere upstream of this driver.
        accept: &[
            Locator::TestId("recover-order-dialog-delete"),
            Locator::Role("button", "Eliminar"),
            Locator::Text("Eliminar"),
        ],
    },
];

pub const MODAL_INVALID_CODES: SelectorList = &[
    Locator::TestId("upload-modal-invalid-codes"),
    Locator::Text("No encontramos los códigos"),
];

pub const MODAL_INVALID_CODES_BODY: SelectorList = &[Locator::TestId("upload-modal-body")];

pub const MODAL_INCONSISTENCIES: SelectorList = &[
    Locator::TestId("upload-modal-inconsistencies"),
    Locator::Text("detectamos inconsistencias"),
];

pub const MODAL_CLOSE_BUTTON: SelectorList = &[
    Locator::TestId("upload-modal-close"),
    Locator::Role("button", "Cerrar"),
    Locator::Text("Cerrar"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testid_is_always_tried_first_when_present() {
        for list in [
            LOGIN_MODE_COMBOBOX,
            LOGIN_USER_INPUT,
            IMPERSONATION_RADIO,
            CONSULTORA_CODE_INPUT,
            CYCLE_RADIO_GROUP,
            FILE_INPUT,
        ] {
            assert!(
                matches!(list[0], Locator::TestId(_)),
                "expected data-testid first in {list:?}"
            );
        }
    }

    #[test]
    fn adaptive_popups_are_in_the_spec_mandated_order() {
        let names: Vec<_> = ADAPTIVE_POPUPS.iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec![
                "cycle_dialog",
                "direct_sale_dialog",
                "listo_popup",
                "recover_saved_order_dialog",
            ]
        );
    }
}
