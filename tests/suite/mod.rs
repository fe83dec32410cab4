mod negotiation_flow;
mod sqlite_store;
mod terminate_command;
mod transfer_flow;
mod validation;
