//! Built-in labeled corpus the default model is trained on.

use triage_shared::Category::{self, FeatureRequest, Invoice, SupportTicket};

pub(crate) const SEED_SAMPLES: &[(&str, Category)] = &[
    // invoices
    ("Invoice #1023, Total Due: $450.00", Invoice),
    ("Generate invoice for order #789", Invoice),
    ("Check invoice payment status", Invoice),
    ("Send invoice to client", Invoice),
    ("Invoice #456 is incorrect", Invoice),
    ("INVOICE No. 2024-118 Bill To: Acme Corp Amount Due: $1,250.00 Due Date: 30 June", Invoice),
    ("Please find attached the invoice for March services. Payment terms net 30.", Invoice),
    ("Subtotal $900.00 Tax $72.00 Total $972.00 Thank you for your business", Invoice),
    ("Receipt number 55812 paid by card, amount 89.99 USD", Invoice),
    ("Billing statement for account 7731, balance outstanding 310.00 EUR", Invoice),
    ("We were billed twice for the same invoice this month", Invoice),
    ("Purchase order 4471 line items quantity unit price amount", Invoice),
    ("Remit payment to the bank account below before the due date", Invoice),
    ("Our records show invoice 3302 remains unpaid, please remit the balance due", Invoice),
    ("Tax invoice VAT registration number total payable including VAT", Invoice),
    ("Can you resend the invoice with our updated billing address", Invoice),
    ("Credit note issued against invoice 1187 for the returned items", Invoice),
    ("Monthly subscription invoice: Pro plan 12 seats, total amount due 480.00", Invoice),
    ("Payment received, thank you. Invoice 9921 marked as paid.", Invoice),
    ("Invoice date 01/02/2025 invoice number INV-0042 customer id 8812", Invoice),
    ("Please update the PO number on invoice 6610 before processing payment", Invoice),
    ("Statement of account with unpaid invoices and late payment fee", Invoice),
    // support tickets
    ("I can't log in to the system", SupportTicket),
    ("Getting error 404", SupportTicket),
    ("My account is locked", SupportTicket),
    ("Dashboard not loading", SupportTicket),
    ("System is very slow", SupportTicket),
    ("The app crashes every time I open the reports page", SupportTicket),
    ("Password reset email never arrives, I am locked out", SupportTicket),
    ("Export to PDF fails with an unexpected error message", SupportTicket),
    ("Sync stopped working after the latest update", SupportTicket),
    ("Getting a 500 internal server error when saving my profile", SupportTicket),
    ("The mobile app is broken on Android, screen stays blank", SupportTicket),
    ("Unable to connect to the API, requests time out", SupportTicket),
    ("Bug: notifications are sent twice for the same event", SupportTicket),
    ("Urgent: production is down and users cannot access the portal", SupportTicket),
    ("Upload button does nothing, nothing happens when I click it", SupportTicket),
    ("I keep getting logged out every few minutes", SupportTicket),
    ("The search results page shows an exception stack trace", SupportTicket),
    ("Two factor code is rejected even though it is correct", SupportTicket),
    ("Reports show wrong numbers since yesterday, please help", SupportTicket),
    ("Page freezes when I try to attach a file larger than 10 MB", SupportTicket),
    ("Error code 403 forbidden when opening shared documents", SupportTicket),
    ("Having trouble with the integration, webhook deliveries failing", SupportTicket),
    // feature requests
    ("Can we add dark mode?", FeatureRequest),
    ("I'd like a bulk upload feature", FeatureRequest),
    ("Suggest adding email notifications", FeatureRequest),
    ("It would be nice to have Excel export", FeatureRequest),
    ("Could you add an option to schedule reports weekly", FeatureRequest),
    ("Feature request: allow users to customize the dashboard layout", FeatureRequest),
    ("Would love to see a calendar view for tasks", FeatureRequest),
    ("Please consider adding single sign on with Okta", FeatureRequest),
    ("Suggestion: keyboard shortcuts for common actions", FeatureRequest),
    ("It would be great if the mobile app supported offline mode", FeatureRequest),
    ("Can you implement two way sync with Google Calendar", FeatureRequest),
    ("We need the ability to export data as CSV", FeatureRequest),
    ("I wish there was a way to tag and filter tickets", FeatureRequest),
    ("Enhancement idea: show a progress bar for long imports", FeatureRequest),
    ("Add support for multiple currencies in reports", FeatureRequest),
    ("Is there a plan to add a public API on the roadmap", FeatureRequest),
    ("New feature proposal: shared team workspaces", FeatureRequest),
    ("Could we get a Slack integration for alerts", FeatureRequest),
    ("I'd love a dark theme and larger fonts for accessibility", FeatureRequest),
    ("Allow us to set custom fields on customer profiles", FeatureRequest),
    ("Improvement: let admins bulk edit user roles", FeatureRequest),
    ("It would be helpful to have audit logs for changes", FeatureRequest),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corpus_covers_every_category() {
        for category in Category::ALL {
            let n = SEED_SAMPLES.iter().filter(|(_, c)| *c == category).count();
            assert!(n >= 20, "{category} has only {n} seed samples");
        }
    }
}
