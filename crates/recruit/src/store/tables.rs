use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::rows::{
    Applicant, ApplicantId, AssignMode, AutoAssignRule, Company, CompanyId, NewApplicant,
    NewSchedule, PipelineEvent, Schedule, ScheduleId, SelectStatus, SelectStatusId, Team, TeamId,
    User, UserId,
};
use super::StoreError;
use crate::ids::{HashKey, HashKeyPrefix};

/// Arena of rows keyed by integer IDs. Every mutation keeps referential integrity.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    next_id: u64,
    companies: BTreeMap<CompanyId, Company>,
    teams: BTreeMap<TeamId, Team>,
    users: BTreeMap<UserId, User>,
    memberships: BTreeSet<(TeamId, UserId)>,
    applicants: BTreeMap<ApplicantId, Applicant>,
    statuses: BTreeMap<SelectStatusId, SelectStatus>,
    event_bindings: BTreeMap<(TeamId, PipelineEvent), SelectStatusId>,
    round_bindings: BTreeMap<(TeamId, u8), SelectStatusId>,
    schedules: BTreeMap<ScheduleId, Schedule>,
    schedule_users: BTreeSet<(ScheduleId, UserId)>,
    round_minimums: BTreeMap<(TeamId, u8), u8>,
    eligibility: BTreeSet<(TeamId, u8, UserId)>,
    priorities: BTreeMap<(TeamId, UserId), u32>,
    auto_rules: BTreeMap<TeamId, AutoAssignRule>,
}

impl Tables {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn unique_key<'a, I>(prefix: HashKeyPrefix, taken: I) -> HashKey
    where
        I: Iterator<Item = &'a HashKey> + Clone,
    {
        loop {
            let candidate = HashKey::generate(prefix);
            if !taken.clone().any(|key| *key == candidate) {
                return candidate;
            }
        }
    }

    // companies

    pub fn insert_company(&mut self, name: &str) -> Result<CompanyId, StoreError> {
        if self.companies.values().any(|company| company.name == name) {
            return Err(StoreError::Duplicate {
                entity: "company",
                field: "name",
            });
        }
        let id = CompanyId(self.allocate());
        let hash_key = Self::unique_key(
            HashKeyPrefix::Company,
            self.companies.values().map(|company| &company.hash_key),
        );
        self.companies.insert(
            id,
            Company {
                id,
                hash_key,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    pub fn company(&self, id: CompanyId) -> Option<&Company> {
        self.companies.get(&id)
    }

    // teams

    pub fn insert_team(
        &mut self,
        company_id: CompanyId,
        name: &str,
        rounds: u8,
        assign_mode: AssignMode,
    ) -> Result<TeamId, StoreError> {
        self.require_company(company_id)?;
        self.ensure_team_name_free(company_id, name, None)?;
        let id = TeamId(self.allocate());
        let hash_key = Self::unique_key(
            HashKeyPrefix::Team,
            self.teams.values().map(|team| &team.hash_key),
        );
        self.teams.insert(
            id,
            Team {
                id,
                company_id,
                hash_key,
                name: name.to_string(),
                rounds,
                assign_mode,
            },
        );
        Ok(id)
    }

    pub(crate) fn ensure_team_name_free(
        &self,
        company_id: CompanyId,
        name: &str,
        except: Option<TeamId>,
    ) -> Result<(), StoreError> {
        let taken = self.teams.values().any(|team| {
            team.company_id == company_id && team.name == name && Some(team.id) != except
        });
        if taken {
            Err(StoreError::Duplicate {
                entity: "team",
                field: "name",
            })
        } else {
            Ok(())
        }
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    pub fn team_mut(&mut self, id: TeamId) -> Option<&mut Team> {
        self.teams.get_mut(&id)
    }

    /// Tenant-scoped lookup by public key.
    pub fn team_by_key(&self, company_id: CompanyId, key: &HashKey) -> Option<&Team> {
        self.teams
            .values()
            .find(|team| team.company_id == company_id && team.hash_key == *key)
    }

    pub fn teams_of(&self, company_id: CompanyId) -> Vec<&Team> {
        self.teams
            .values()
            .filter(|team| team.company_id == company_id)
            .collect()
    }

    /// A team is in use while an applicant or schedule still references it.
    pub fn team_in_use(&self, team_id: TeamId) -> bool {
        self.applicants
            .values()
            .any(|applicant| applicant.team_id == team_id)
            || self
                .schedules
                .values()
                .any(|schedule| schedule.team_id == team_id)
    }

    /// Removes a team and every per-team row it owns.
    pub fn remove_team(&mut self, team_id: TeamId) -> Result<Team, StoreError> {
        if self.team_in_use(team_id) {
            return Err(StoreError::Integrity(format!(
                "team {} is still referenced",
                team_id.0
            )));
        }
        let team = self
            .teams
            .remove(&team_id)
            .ok_or(StoreError::NotFound { entity: "team" })?;
        self.memberships.retain(|(team, _)| *team != team_id);
        self.statuses.retain(|_, status| status.team_id != team_id);
        self.event_bindings.retain(|(team, _), _| *team != team_id);
        self.round_bindings.retain(|(team, _), _| *team != team_id);
        self.round_minimums.retain(|(team, _), _| *team != team_id);
        self.eligibility.retain(|(team, _, _)| *team != team_id);
        self.priorities.retain(|(team, _), _| *team != team_id);
        self.auto_rules.remove(&team_id);
        Ok(team)
    }

    fn require_company(&self, company_id: CompanyId) -> Result<(), StoreError> {
        if self.companies.contains_key(&company_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound { entity: "company" })
        }
    }

    fn require_team(&self, team_id: TeamId) -> Result<&Team, StoreError> {
        self.teams
            .get(&team_id)
            .ok_or(StoreError::NotFound { entity: "team" })
    }

    // users

    pub fn insert_user(
        &mut self,
        company_id: CompanyId,
        name: &str,
        email: &str,
    ) -> Result<UserId, StoreError> {
        self.require_company(company_id)?;
        let normalized = email.trim().to_ascii_lowercase();
        if self
            .users
            .values()
            .any(|user| user.company_id == company_id && user.email == normalized)
        {
            return Err(StoreError::Duplicate {
                entity: "user",
                field: "email",
            });
        }
        let id = UserId(self.allocate());
        let hash_key = Self::unique_key(
            HashKeyPrefix::User,
            self.users.values().map(|user| &user.hash_key),
        );
        self.users.insert(
            id,
            User {
                id,
                company_id,
                hash_key,
                name: name.to_string(),
                email: normalized,
            },
        );
        Ok(id)
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn user_by_key(&self, company_id: CompanyId, key: &HashKey) -> Option<&User> {
        self.users
            .values()
            .find(|user| user.company_id == company_id && user.hash_key == *key)
    }

    // memberships

    pub fn add_membership(&mut self, team_id: TeamId, user_id: UserId) -> Result<bool, StoreError> {
        let team_company = self.require_team(team_id)?.company_id;
        let user = self
            .users
            .get(&user_id)
            .ok_or(StoreError::NotFound { entity: "user" })?;
        if user.company_id != team_company {
            return Err(StoreError::NotFound { entity: "user" });
        }
        Ok(self.memberships.insert((team_id, user_id)))
    }

    /// Drops the membership along with the user's eligibility and priority rows for the team.
    pub fn remove_membership(&mut self, team_id: TeamId, user_id: UserId) -> bool {
        let removed = self.memberships.remove(&(team_id, user_id));
        if removed {
            self.eligibility
                .retain(|(team, _, user)| !(*team == team_id && *user == user_id));
            if self.priorities.remove(&(team_id, user_id)).is_some() {
                let remaining = self.priority_list(team_id);
                for (index, user) in remaining.into_iter().enumerate() {
                    self.priorities.insert((team_id, user), index as u32 + 1);
                }
            }
        }
        removed
    }

    pub fn is_member(&self, team_id: TeamId, user_id: UserId) -> bool {
        self.memberships.contains(&(team_id, user_id))
    }

    pub fn members(&self, team_id: TeamId) -> Vec<UserId> {
        self.memberships
            .range((team_id, UserId(0))..=(team_id, UserId(u64::MAX)))
            .map(|(_, user)| *user)
            .collect()
    }

    // statuses and pipeline bindings

    pub fn insert_status(
        &mut self,
        team_id: TeamId,
        name: &str,
        position: u16,
    ) -> Result<SelectStatusId, StoreError> {
        self.require_team(team_id)?;
        if self
            .statuses
            .values()
            .any(|status| status.team_id == team_id && status.name == name)
        {
            return Err(StoreError::Duplicate {
                entity: "select_status",
                field: "name",
            });
        }
        let id = SelectStatusId(self.allocate());
        let hash_key = Self::unique_key(
            HashKeyPrefix::SelectStatus,
            self.statuses.values().map(|status| &status.hash_key),
        );
        self.statuses.insert(
            id,
            SelectStatus {
                id,
                team_id,
                hash_key,
                name: name.to_string(),
                position,
            },
        );
        Ok(id)
    }

    /// Installs a replacement status list next to the current one. Names only need to be
    /// unique within `names`; the caller retires the previous statuses before committing.
    pub fn stage_statuses(
        &mut self,
        team_id: TeamId,
        names: &[String],
    ) -> Result<Vec<SelectStatusId>, StoreError> {
        self.require_team(team_id)?;
        let mut seen = BTreeSet::new();
        if names.iter().any(|name| !seen.insert(name.as_str())) {
            return Err(StoreError::Duplicate {
                entity: "select_status",
                field: "name",
            });
        }
        let mut ids = Vec::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            let id = SelectStatusId(self.allocate());
            let hash_key = Self::unique_key(
                HashKeyPrefix::SelectStatus,
                self.statuses.values().map(|status| &status.hash_key),
            );
            self.statuses.insert(
                id,
                SelectStatus {
                    id,
                    team_id,
                    hash_key,
                    name: name.clone(),
                    position: position as u16,
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn status_by_key(&self, team_id: TeamId, key: &HashKey) -> Option<&SelectStatus> {
        self.statuses
            .values()
            .find(|status| status.team_id == team_id && status.hash_key == *key)
    }

    pub fn status(&self, id: SelectStatusId) -> Option<&SelectStatus> {
        self.statuses.get(&id)
    }

    /// Statuses of a team in display order.
    pub fn statuses_of(&self, team_id: TeamId) -> Vec<&SelectStatus> {
        let mut statuses: Vec<&SelectStatus> = self
            .statuses
            .values()
            .filter(|status| status.team_id == team_id)
            .collect();
        statuses.sort_by_key(|status| (status.position, status.id));
        statuses
    }

    /// Removes a status nothing references any more.
    pub fn remove_status(&mut self, id: SelectStatusId) -> Result<(), StoreError> {
        let referenced = self
            .applicants
            .values()
            .any(|applicant| applicant.status_id == id)
            || self.event_bindings.values().any(|status| *status == id)
            || self.round_bindings.values().any(|status| *status == id);
        if referenced {
            return Err(StoreError::Integrity(format!(
                "select status {} is still referenced",
                id.0
            )));
        }
        self.statuses
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                entity: "select_status",
            })
    }

    fn require_team_status(
        &self,
        team_id: TeamId,
        status_id: SelectStatusId,
    ) -> Result<(), StoreError> {
        match self.statuses.get(&status_id) {
            Some(status) if status.team_id == team_id => Ok(()),
            Some(_) => Err(StoreError::Integrity(format!(
                "select status {} belongs to another team",
                status_id.0
            ))),
            None => Err(StoreError::NotFound {
                entity: "select_status",
            }),
        }
    }

    pub fn bind_event(
        &mut self,
        team_id: TeamId,
        event: PipelineEvent,
        status_id: SelectStatusId,
    ) -> Result<(), StoreError> {
        self.require_team_status(team_id, status_id)?;
        self.event_bindings.insert((team_id, event), status_id);
        Ok(())
    }

    pub fn clear_event_bindings(&mut self, team_id: TeamId) {
        self.event_bindings.retain(|(team, _), _| *team != team_id);
    }

    pub fn event_binding(&self, team_id: TeamId, event: PipelineEvent) -> Option<SelectStatusId> {
        self.event_bindings.get(&(team_id, event)).copied()
    }

    pub fn event_bindings_of(&self, team_id: TeamId) -> Vec<(PipelineEvent, SelectStatusId)> {
        self.event_bindings
            .iter()
            .filter(|((team, _), _)| *team == team_id)
            .map(|((_, event), status)| (*event, *status))
            .collect()
    }

    pub fn bind_round(
        &mut self,
        team_id: TeamId,
        round: u8,
        status_id: SelectStatusId,
    ) -> Result<(), StoreError> {
        self.require_team_status(team_id, status_id)?;
        self.round_bindings.insert((team_id, round), status_id);
        Ok(())
    }

    pub fn clear_round_bindings(&mut self, team_id: TeamId) {
        self.round_bindings.retain(|(team, _), _| *team != team_id);
    }

    pub fn round_binding(&self, team_id: TeamId, round: u8) -> Option<SelectStatusId> {
        self.round_bindings.get(&(team_id, round)).copied()
    }

    pub fn round_bindings_of(&self, team_id: TeamId) -> Vec<(u8, SelectStatusId)> {
        self.round_bindings
            .range((team_id, 0)..=(team_id, u8::MAX))
            .map(|((_, round), status)| (*round, *status))
            .collect()
    }

    // applicants

    pub fn insert_applicant(&mut self, new: NewApplicant) -> Result<ApplicantId, StoreError> {
        let team = self.require_team(new.team_id)?;
        if team.company_id != new.company_id {
            return Err(StoreError::NotFound { entity: "team" });
        }
        self.require_team_status(new.team_id, new.status_id)?;
        if self
            .find_applicant(new.team_id, &new.site, &new.outer_id)
            .is_some()
        {
            return Err(StoreError::Duplicate {
                entity: "applicant",
                field: "outer_id",
            });
        }
        let id = ApplicantId(self.allocate());
        let hash_key = Self::unique_key(
            HashKeyPrefix::Applicant,
            self.applicants.values().map(|applicant| &applicant.hash_key),
        );
        self.applicants.insert(
            id,
            Applicant {
                id,
                company_id: new.company_id,
                team_id: new.team_id,
                hash_key,
                site: new.site,
                outer_id: new.outer_id,
                name: new.name,
                email: new.email,
                status_id: new.status_id,
                round: 0,
                schedule_id: None,
                resume: None,
                curriculum_vitae: None,
                meet_url: None,
                created_at: new.created_at,
            },
        );
        Ok(id)
    }

    pub fn applicant(&self, id: ApplicantId) -> Option<&Applicant> {
        self.applicants.get(&id)
    }

    pub fn applicant_mut(&mut self, id: ApplicantId) -> Option<&mut Applicant> {
        self.applicants.get_mut(&id)
    }

    pub fn applicant_by_key(&self, company_id: CompanyId, key: &HashKey) -> Option<&Applicant> {
        self.applicants
            .values()
            .find(|applicant| applicant.company_id == company_id && applicant.hash_key == *key)
    }

    pub fn find_applicant(&self, team_id: TeamId, site: &str, outer_id: &str) -> Option<&Applicant> {
        self.applicants.values().find(|applicant| {
            applicant.team_id == team_id && applicant.site == site && applicant.outer_id == outer_id
        })
    }

    pub fn applicants_of_team(&self, team_id: TeamId) -> Vec<&Applicant> {
        self.applicants
            .values()
            .filter(|applicant| applicant.team_id == team_id)
            .collect()
    }

    /// Moves an applicant to another status of its own team.
    pub fn set_applicant_status(
        &mut self,
        id: ApplicantId,
        status_id: SelectStatusId,
    ) -> Result<(), StoreError> {
        let team_id = self
            .applicants
            .get(&id)
            .map(|applicant| applicant.team_id)
            .ok_or(StoreError::NotFound {
                entity: "applicant",
            })?;
        self.require_team_status(team_id, status_id)?;
        if let Some(applicant) = self.applicants.get_mut(&id) {
            applicant.status_id = status_id;
        }
        Ok(())
    }

    // schedules

    pub fn insert_schedule(
        &mut self,
        new: NewSchedule,
        now: DateTime<Utc>,
    ) -> Result<ScheduleId, StoreError> {
        let team = self.require_team(new.team_id)?;
        if team.company_id != new.company_id {
            return Err(StoreError::NotFound { entity: "team" });
        }
        if new.end <= new.start {
            return Err(StoreError::Integrity(
                "schedule end must be after start".to_string(),
            ));
        }
        let id = ScheduleId(self.allocate());
        let hash_key = Self::unique_key(
            HashKeyPrefix::Schedule,
            self.schedules.values().map(|schedule| &schedule.hash_key),
        );
        self.schedules.insert(
            id,
            Schedule {
                id,
                company_id: new.company_id,
                team_id: new.team_id,
                hash_key,
                title: new.title,
                frequency: new.frequency,
                interview: new.interview,
                start: new.start,
                end: new.end,
                updated_at: now,
            },
        );
        Ok(id)
    }

    pub fn schedule(&self, id: ScheduleId) -> Option<&Schedule> {
        self.schedules.get(&id)
    }

    pub fn schedule_mut(&mut self, id: ScheduleId) -> Option<&mut Schedule> {
        self.schedules.get_mut(&id)
    }

    pub fn schedule_by_key(&self, company_id: CompanyId, key: &HashKey) -> Option<&Schedule> {
        self.schedules
            .values()
            .find(|schedule| schedule.company_id == company_id && schedule.hash_key == *key)
    }

    pub fn schedule_ids(&self) -> Vec<ScheduleId> {
        self.schedules.keys().copied().collect()
    }

    pub fn schedules(&self) -> impl Iterator<Item = &Schedule> {
        self.schedules.values()
    }

    /// Deletes a schedule, its association edges, and clears applicant references to it.
    pub fn remove_schedule(&mut self, id: ScheduleId) -> Result<Schedule, StoreError> {
        let schedule = self
            .schedules
            .remove(&id)
            .ok_or(StoreError::NotFound { entity: "schedule" })?;
        self.schedule_users.retain(|(schedule, _)| *schedule != id);
        for applicant in self.applicants.values_mut() {
            if applicant.schedule_id == Some(id) {
                applicant.schedule_id = None;
            }
        }
        Ok(schedule)
    }

    pub fn attach_user(&mut self, schedule_id: ScheduleId, user_id: UserId) -> Result<(), StoreError> {
        let schedule_company = self
            .schedules
            .get(&schedule_id)
            .map(|schedule| schedule.company_id)
            .ok_or(StoreError::NotFound { entity: "schedule" })?;
        match self.users.get(&user_id) {
            Some(user) if user.company_id == schedule_company => {
                self.schedule_users.insert((schedule_id, user_id));
                Ok(())
            }
            _ => Err(StoreError::NotFound { entity: "user" }),
        }
    }

    pub fn schedule_users(&self, schedule_id: ScheduleId) -> Vec<UserId> {
        self.schedule_users
            .range((schedule_id, UserId(0))..=(schedule_id, UserId(u64::MAX)))
            .map(|(_, user)| *user)
            .collect()
    }

    pub fn schedules_of_user(&self, user_id: UserId) -> Vec<&Schedule> {
        self.schedule_users
            .iter()
            .filter(|(_, user)| *user == user_id)
            .filter_map(|(schedule, _)| self.schedules.get(schedule))
            .collect()
    }

    /// Applicants whose weak reference points at the schedule.
    pub fn applicants_on_schedule(&self, schedule_id: ScheduleId) -> Vec<ApplicantId> {
        self.applicants
            .values()
            .filter(|applicant| applicant.schedule_id == Some(schedule_id))
            .map(|applicant| applicant.id)
            .collect()
    }

    // per-round staffing

    pub fn set_round_minimum(&mut self, team_id: TeamId, round: u8, user_min: u8) -> Result<(), StoreError> {
        self.require_team(team_id)?;
        self.round_minimums.insert((team_id, round), user_min);
        Ok(())
    }

    pub fn round_minimum(&self, team_id: TeamId, round: u8) -> Option<u8> {
        self.round_minimums.get(&(team_id, round)).copied()
    }

    pub fn round_minimums_of(&self, team_id: TeamId) -> Vec<(u8, u8)> {
        self.round_minimums
            .range((team_id, 0)..=(team_id, u8::MAX))
            .map(|((_, round), min)| (*round, *min))
            .collect()
    }

    /// Deletes per-round staffing, eligibility, and round bindings above `rounds`.
    pub fn truncate_rounds(&mut self, team_id: TeamId, rounds: u8) {
        self.round_minimums
            .retain(|(team, round), _| !(*team == team_id && *round > rounds));
        self.eligibility
            .retain(|(team, round, _)| !(*team == team_id && *round > rounds));
        self.round_bindings
            .retain(|(team, round), _| !(*team == team_id && *round > rounds));
    }

    pub fn grant_eligibility(&mut self, team_id: TeamId, round: u8, user_id: UserId) -> Result<(), StoreError> {
        if !self.is_member(team_id, user_id) {
            return Err(StoreError::NotFound { entity: "user" });
        }
        self.eligibility.insert((team_id, round, user_id));
        Ok(())
    }

    pub fn clear_eligibility(&mut self, team_id: TeamId, round: u8) {
        self.eligibility
            .retain(|(team, r, _)| !(*team == team_id && *r == round));
    }

    pub fn is_eligible(&self, team_id: TeamId, round: u8, user_id: UserId) -> bool {
        self.eligibility.contains(&(team_id, round, user_id))
    }

    pub fn eligible_users(&self, team_id: TeamId, round: u8) -> Vec<UserId> {
        self.eligibility
            .range((team_id, round, UserId(0))..=(team_id, round, UserId(u64::MAX)))
            .map(|(_, _, user)| *user)
            .collect()
    }

    pub fn eligibility_of(&self, team_id: TeamId) -> BTreeMap<u8, Vec<UserId>> {
        let mut matrix: BTreeMap<u8, Vec<UserId>> = BTreeMap::new();
        for (_, round, user) in self
            .eligibility
            .range((team_id, 0, UserId(0))..=(team_id, u8::MAX, UserId(u64::MAX)))
        {
            matrix.entry(*round).or_default().push(*user);
        }
        matrix
    }

    // assignment priority and rule

    /// Replaces the team's priority list with `ordered`, numbered from 1.
    pub fn replace_priorities(&mut self, team_id: TeamId, ordered: &[UserId]) -> Result<(), StoreError> {
        self.require_team(team_id)?;
        if let Some(stranger) = ordered.iter().find(|user| !self.is_member(team_id, **user)) {
            return Err(StoreError::Integrity(format!(
                "user {} is not a member of team {}",
                stranger.0, team_id.0
            )));
        }
        self.priorities.retain(|(team, _), _| *team != team_id);
        for (index, user) in ordered.iter().enumerate() {
            self.priorities.insert((team_id, *user), index as u32 + 1);
        }
        Ok(())
    }

    pub fn priority_of(&self, team_id: TeamId, user_id: UserId) -> Option<u32> {
        self.priorities.get(&(team_id, user_id)).copied()
    }

    /// Users in ascending priority order.
    pub fn priority_list(&self, team_id: TeamId) -> Vec<UserId> {
        let mut entries: Vec<(u32, UserId)> = self
            .priorities
            .range((team_id, UserId(0))..=(team_id, UserId(u64::MAX)))
            .map(|((_, user), priority)| (*priority, *user))
            .collect();
        entries.sort();
        entries.into_iter().map(|(_, user)| user).collect()
    }

    pub fn set_auto_rule(&mut self, team_id: TeamId, rule: AutoAssignRule) -> Result<(), StoreError> {
        self.require_team(team_id)?;
        self.auto_rules.insert(team_id, rule);
        Ok(())
    }

    pub fn auto_rule(&self, team_id: TeamId) -> Option<AutoAssignRule> {
        self.auto_rules.get(&team_id).copied()
    }

    /// Verifies the cross-table invariants that must hold after every committed write.
    pub fn check_invariants(&self) -> Result<(), String> {
        for applicant in self.applicants.values() {
            match self.statuses.get(&applicant.status_id) {
                Some(status) if status.team_id == applicant.team_id => {}
                _ => {
                    return Err(format!(
                        "applicant {} has a status outside team {}",
                        applicant.hash_key, applicant.team_id.0
                    ))
                }
            }
        }

        for team in self.teams.values() {
            let expected: Vec<u8> = (1..=team.rounds).collect();
            let staffed: Vec<u8> = self
                .round_minimums_of(team.id)
                .into_iter()
                .map(|(round, _)| round)
                .collect();
            if staffed != expected {
                return Err(format!(
                    "team {} has per-round rows {:?} for {} rounds",
                    team.hash_key, staffed, team.rounds
                ));
            }
            if let Some(round) = self
                .eligibility_of(team.id)
                .keys()
                .find(|round| **round == 0 || **round > team.rounds)
            {
                return Err(format!(
                    "team {} has eligibility for round {} outside 1..={}",
                    team.hash_key, round, team.rounds
                ));
            }
            if team.assign_mode == AssignMode::Auto
                && self.auto_rule(team.id) == Some(AutoAssignRule::AscByPriority)
            {
                let mut priorities: Vec<u32> = self
                    .priorities
                    .range((team.id, UserId(0))..=(team.id, UserId(u64::MAX)))
                    .map(|(_, priority)| *priority)
                    .collect();
                priorities.sort_unstable();
                let members = self.members(team.id).len() as u32;
                if priorities != (1..=members).collect::<Vec<u32>>() {
                    return Err(format!(
                        "team {} priority list is not a dense permutation of its members",
                        team.hash_key
                    ));
                }
            }
        }

        let mut referenced = BTreeSet::new();
        for applicant in self.applicants.values() {
            if let Some(schedule_id) = applicant.schedule_id {
                let interview = self
                    .schedules
                    .get(&schedule_id)
                    .map(|schedule| schedule.interview)
                    .unwrap_or(false);
                if interview && !referenced.insert(schedule_id) {
                    return Err(format!(
                        "interview schedule {} is shared by several applicants",
                        schedule_id.0
                    ));
                }
            }
        }

        Ok(())
    }
}
