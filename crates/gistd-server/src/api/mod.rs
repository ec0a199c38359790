// ABOUTME: API handler modules for the gistd HTTP server.
// ABOUTME: Workflow submission, status polling, run listing, and provider status.

pub mod workflows;
