//! GraphQL documents sent to the order service.

/// Order fields the payment step reads.
pub const PAYMENT_ORDER: &str = r"
query PaymentOrder($id: ID!) {
  ecommerceOrder(id: $id) {
    id
    mode
    state
    stateExpiresAt
    currencyCode
    requestedFulfillment {
      __typename
      ... on Ship {
        name
        addressLine1
        addressLine2
        city
        region
        postalCode
        country
        phoneNumber
      }
    }
    creditCard {
      name
      street1
      street2
      city
      state
      country
      postal_code
    }
    buyer {
      ... on Partner { id }
      ... on User { id }
    }
    ... on OfferOrder {
      awaitingResponseFrom
      lastOffer {
        id
        createdAt
        amountCents
        buyerTotalCents
      }
    }
  }
}
";

/// Mutation 1: record a credit card from a card token.
pub const CREATE_CREDIT_CARD: &str = r"
mutation PaymentCreateCreditCard($input: CreditCardInput!) {
  createCreditCard(input: $input) {
    creditCardOrError {
      __typename
      ... on CreditCardMutationSuccess {
        creditCard { id }
      }
      ... on CreditCardMutationFailure {
        mutationError { type message detail }
      }
    }
  }
}
";

/// Mutation 2: attach a recorded credit card to the order.
pub const SET_ORDER_PAYMENT: &str = r"
mutation PaymentSetOrderPayment($input: CommerceSetPaymentInput!) {
  ecommerceSetOrderPayment(input: $input) {
    orderOrError {
      __typename
      ... on OrderWithMutationSuccess {
        order { id state }
      }
      ... on OrderWithMutationFailure {
        error { type code data }
      }
    }
  }
}
";
