use crate::resource::EnumTable;

pub const ACCOUNT_TYPE_CASH: i64 = 1;
pub const ACCOUNT_TYPE_DEBIT_CARD: i64 = 2;
pub const ACCOUNT_TYPE_CREDIT_CARD: i64 = 3;
pub const ACCOUNT_TYPE_SAVINGS: i64 = 4;
pub const ACCOUNT_TYPE_INVESTMENT: i64 = 5;

pub static ACCOUNT_TYPE: EnumTable = EnumTable::new(
    "AccountType",
    &[
        ("cash", ACCOUNT_TYPE_CASH),
        ("debit_card", ACCOUNT_TYPE_DEBIT_CARD),
        ("credit_card", ACCOUNT_TYPE_CREDIT_CARD),
        ("savings", ACCOUNT_TYPE_SAVINGS),
        ("investment", ACCOUNT_TYPE_INVESTMENT),
    ],
);

pub const ACCOUNT_STATUS_ACTIVE: i64 = 1;
pub const ACCOUNT_STATUS_ARCHIVED: i64 = 2;

pub static ACCOUNT_STATUS: EnumTable =
    EnumTable::new("AccountStatus", &[("active", ACCOUNT_STATUS_ACTIVE), ("archived", ACCOUNT_STATUS_ARCHIVED)]);

pub const DIRECTION_IN: i64 = 1;
pub const DIRECTION_OUT: i64 = 2;
pub const DIRECTION_TRANSFER: i64 = 3;

pub static TRANSACTION_DIRECTION: EnumTable = EnumTable::new(
    "TransactionDirection",
    &[("in", DIRECTION_IN), ("out", DIRECTION_OUT), ("transfer", DIRECTION_TRANSFER)],
);
