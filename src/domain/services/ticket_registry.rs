use serde::{Deserialize, Serialize};
use crate::domain::models::{
    ticket::{NewReply, NewTicket, Reply, StatusFilter, Ticket, TicketPatch, TicketStatus},
    user::SupportActor,
};
use crate::error::AppError;

/// Replies from someone other than `actor_id` that are still unread.
pub fn unread_count(ticket: &Ticket, actor_id: &str) -> usize {
    ticket.unread_count(actor_id)
}

pub fn is_ticket_owner(ticket: &Ticket, actor: &SupportActor) -> bool {
    ticket.customer_id == actor.id
}

pub fn can_view(ticket: &Ticket, actor: &SupportActor) -> bool {
    actor.is_agent() || is_ticket_owner(ticket, actor)
}

pub fn can_reply(ticket: &Ticket, actor: &SupportActor) -> bool {
    can_view(ticket, actor)
}

/// Owning customer, while the ticket is still open for changes.
pub fn can_edit(ticket: &Ticket, actor: &SupportActor) -> bool {
    is_ticket_owner(ticket, actor) && ticket.status != TicketStatus::Resolved
}

pub fn can_delete(ticket: &Ticket, actor: &SupportActor) -> bool {
    can_edit(ticket, actor)
}

pub fn can_change_status(actor: &SupportActor) -> bool {
    actor.is_agent()
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub all: usize,
    pub open: usize,
    pub pending: usize,
    pub resolved: usize,
}

impl StatusCounts {
    pub fn from_tickets<'a>(tickets: impl IntoIterator<Item = &'a Ticket>) -> Self {
        let mut counts = StatusCounts::default();
        for ticket in tickets {
            counts.all += 1;
            match ticket.status {
                TicketStatus::Open => counts.open += 1,
                TicketStatus::Pending => counts.pending += 1,
                TicketStatus::Resolved => counts.resolved += 1,
            }
        }
        counts
    }
}

/// Tickets with their reply threads, most recent first.
#[derive(Debug, Clone)]
pub struct TicketRegistry {
    actor: SupportActor,
    tickets: Vec<Ticket>,
    status_filter: StatusFilter,
}

impl TicketRegistry {
    pub fn new(actor: SupportActor) -> Self {
        Self { actor, tickets: Vec::new(), status_filter: StatusFilter::All }
    }

    pub fn with_tickets(actor: SupportActor, tickets: Vec<Ticket>) -> Self {
        Self { actor, tickets, status_filter: StatusFilter::All }
    }

    pub fn actor(&self) -> &SupportActor {
        &self.actor
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    fn ticket_mut(&mut self, id: &str) -> Result<&mut Ticket, AppError> {
        self.tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(AppError::NotFound("Ticket not found".into()))
    }

    pub fn create_ticket(&mut self, data: NewTicket) -> Result<Ticket, AppError> {
        data.validate()?;
        let ticket = Ticket::new(data, self.actor.id.clone(), self.actor.name.clone(), self.actor.email.clone());
        self.tickets.insert(0, ticket.clone());
        Ok(ticket)
    }

    pub fn update_ticket(&mut self, id: &str, patch: TicketPatch) -> Result<Ticket, AppError> {
        let ticket = self.ticket_mut(id)?;
        ticket.apply_patch(patch)?;
        Ok(ticket.clone())
    }

    pub fn delete_ticket(&mut self, id: &str) -> Result<Ticket, AppError> {
        let idx = self
            .tickets
            .iter()
            .position(|t| t.id == id)
            .ok_or(AppError::NotFound("Ticket not found".into()))?;
        Ok(self.tickets.remove(idx))
    }

    pub fn add_reply(&mut self, ticket_id: &str, data: NewReply) -> Result<Reply, AppError> {
        data.validate()?;
        let actor = self.actor.clone();
        let ticket = self.ticket_mut(ticket_id)?;
        let reply = Reply::new(ticket.id.clone(), actor.id, actor.name, actor.role, data.message);
        ticket.push_reply(reply.clone());
        Ok(reply)
    }

    /// Setting the current status again is a no-op and keeps `updated_at`.
    pub fn update_ticket_status(&mut self, id: &str, status: TicketStatus) -> Result<Ticket, AppError> {
        let ticket = self.ticket_mut(id)?;
        ticket.set_status(status);
        Ok(ticket.clone())
    }

    pub fn get_ticket_by_id(&self, id: &str) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == id)
    }

    pub fn mark_replies_as_read(&mut self, ticket_id: &str, reader_id: &str) {
        if let Some(ticket) = self.tickets.iter_mut().find(|t| t.id == ticket_id) {
            ticket.mark_replies_read(reader_id);
        }
    }

    pub fn set_status_filter(&mut self, filter: StatusFilter) {
        self.status_filter = filter;
    }

    pub fn status_filter(&self) -> StatusFilter {
        self.status_filter
    }

    pub fn filtered_tickets(&self) -> Vec<&Ticket> {
        self.tickets.iter().filter(|t| self.status_filter.matches(t.status)).collect()
    }

    pub fn visible_tickets(&self) -> Vec<&Ticket> {
        self.filtered_tickets()
            .into_iter()
            .filter(|t| can_view(t, &self.actor))
            .collect()
    }

    /// Counts ignore the status filter.
    pub fn status_counts(&self) -> StatusCounts {
        StatusCounts::from_tickets(self.tickets.iter().filter(|t| can_view(t, &self.actor)))
    }

    pub fn unread_count(&self, ticket_id: &str) -> usize {
        self.get_ticket_by_id(ticket_id)
            .map(|t| unread_count(t, &self.actor.id))
            .unwrap_or(0)
    }
}
