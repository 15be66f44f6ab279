use chrono::NaiveDate;
use ledgerlens_core::DATE_FORMAT;

/// The instruction sent alongside the receipt image. Categories and budgets are
/// offered as closed choices and "today" is spelled out so relative or partial
/// dates resolve against the caller's clock, not the model's.
pub fn build_instruction(categories: &[String], budgets: &[String], today: NaiveDate) -> String {
    let today = today.format(DATE_FORMAT);
    format!(
        "Please analyze the attached receipt image and extract the following details: \
         1) receipt amount, \
         2) receipt category (choose from: {categories}), \
         3) receipt budget (choose from: {budgets}), \
         4) destination account (store name), \
         5) a short description of the transaction, \
         6) date (in YYYY-MM-DD format). \
         Today's date is {today}. \
         Most receipts are from the past few days, so use today's date as a reference point \
         when interpreting dates. \
         If the date is not on the receipt, use today's date as the default.",
        categories = categories.join(", "),
        budgets = budgets.join(", "),
    )
}
