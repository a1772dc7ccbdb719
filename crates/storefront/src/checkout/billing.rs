//! Billing address reconciliation.
//!
//! Decides which address is sent with the card for tokenization:
//!
//! | Fulfillment | Same-address toggle | Form    | Address used   |
//! |-------------|---------------------|---------|----------------|
//! | Pickup      | not offered         | shown   | billing form   |
//! | Ship        | on                  | hidden  | shipping address |
//! | Ship        | off                 | shown   | billing form   |
//!
//! Hiding the form always wipes it. A saved credit card on the order never
//! pre-fills it.

use gallery_core::{Address, Order, RequestedFulfillment, Ship};

/// Whether billing mirrors the shipping address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShippingBilling {
    /// Billing address is the shipping address; the form is hidden.
    SameAsShipping,
    /// Billing address is entered in the form.
    DifferentAddress,
}

/// Where the billing address comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingChoice {
    /// No shipping address exists; the form is always used.
    Pickup,
    /// The work ships to `ship`.
    Shipping {
        ship: Ship,
        billing: ShippingBilling,
    },
}

impl BillingChoice {
    /// The initial choice for an order: shipping orders start with the
    /// toggle on.
    #[must_use]
    pub fn for_order(order: &Order) -> Self {
        match &order.requested_fulfillment {
            RequestedFulfillment::Pickup => Self::Pickup,
            RequestedFulfillment::Ship(ship) => Self::Shipping {
                ship: ship.clone(),
                billing: ShippingBilling::SameAsShipping,
            },
        }
    }

    /// Whether the same-address toggle is offered.
    #[must_use]
    pub const fn offers_toggle(&self) -> bool {
        matches!(self, Self::Shipping { .. })
    }

    /// Whether the billing form is shown (and validated).
    #[must_use]
    pub const fn form_visible(&self) -> bool {
        !matches!(
            self,
            Self::Shipping {
                billing: ShippingBilling::SameAsShipping,
                ..
            }
        )
    }

    /// Whether the same-address toggle is on.
    #[must_use]
    pub const fn same_as_shipping(&self) -> bool {
        !self.form_visible()
    }
}

/// Billing form state for one payment screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingForm {
    choice: BillingChoice,
    form: Address,
}

impl BillingForm {
    /// A fresh billing form for `order`, always empty.
    #[must_use]
    pub fn for_order(order: &Order) -> Self {
        Self {
            choice: BillingChoice::for_order(order),
            form: Address::empty(),
        }
    }

    /// The current choice.
    #[must_use]
    pub const fn choice(&self) -> &BillingChoice {
        &self.choice
    }

    /// The form contents.
    #[must_use]
    pub const fn form(&self) -> &Address {
        &self.form
    }

    /// Mutable access to the form contents.
    ///
    /// Edits to a hidden form are discarded the next time it is hidden, so
    /// callers only edit a visible form.
    pub const fn form_mut(&mut self) -> &mut Address {
        &mut self.form
    }

    /// Flip the same-address toggle.
    ///
    /// Returns `false` without doing anything when no toggle is offered.
    /// Turning the toggle on hides the form and wipes it.
    pub fn toggle_same_address(&mut self) -> bool {
        let BillingChoice::Shipping { billing, .. } = &mut self.choice else {
            return false;
        };

        *billing = match billing {
            ShippingBilling::SameAsShipping => ShippingBilling::DifferentAddress,
            ShippingBilling::DifferentAddress => {
                self.form = Address::empty();
                ShippingBilling::SameAsShipping
            }
        };
        true
    }

    /// The address to tokenize the card with.
    #[must_use]
    pub fn reconciled(&self) -> Address {
        match &self.choice {
            BillingChoice::Shipping {
                ship,
                billing: ShippingBilling::SameAsShipping,
            } => Address::from(ship),
            BillingChoice::Pickup
            | BillingChoice::Shipping {
                billing: ShippingBilling::DifferentAddress,
                ..
            } => self.form.clone(),
        }
    }
}
