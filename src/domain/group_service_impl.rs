use crate::domain::{
    CreateGroupInput, GroupCreation, GroupError, GroupService, GroupUpdate, MemberRemoval,
    MembershipChange, SentMessage,
};
use crate::domain_model::*;
use crate::domain_port::{
    ConversationRepo, GroupRepo, MessageRepo, ParticipantRepo, StorageTx, TxManager, UserRepo,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

const MAX_GROUP_NAME: usize = 100;

pub struct RealGroupService {
    user_repo: Arc<dyn UserRepo>,
    conversation_repo: Arc<dyn ConversationRepo>,
    participant_repo: Arc<dyn ParticipantRepo>,
    message_repo: Arc<dyn MessageRepo>,
    group_repo: Arc<dyn GroupRepo>,
    tx_manager: Arc<dyn TxManager>,
}

impl RealGroupService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        conversation_repo: Arc<dyn ConversationRepo>,
        participant_repo: Arc<dyn ParticipantRepo>,
        message_repo: Arc<dyn MessageRepo>,
        group_repo: Arc<dyn GroupRepo>,
        tx_manager: Arc<dyn TxManager>,
    ) -> Self {
        Self {
            user_repo,
            conversation_repo,
            participant_repo,
            message_repo,
            group_repo,
            tx_manager,
        }
    }

    /// Mutating group operations require an ADMIN participant. Non-members
    /// and plain members fail differently so clients can tell the cases
    /// apart.
    async fn admin_guard<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        me: UserId,
    ) -> Result<ParticipantRecord, GroupError> {
        let participant = self
            .participant_repo
            .get_in_tx(tx, conversation_id, me)
            .await?
            .ok_or(GroupError::NotMember)?;
        if participant.role != ParticipantRole::Admin {
            return Err(GroupError::NotAdmin);
        }
        Ok(participant)
    }

    /// Persist a SYSTEM message recording an in-conversation event, bump the
    /// conversation clock, and package it for best-effort fanout. Runs
    /// inside the caller's transaction.
    async fn system_message_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        actor: UserId,
        content: String,
        now: DateTime<Utc>,
    ) -> Result<SentMessage, GroupError> {
        let record = MessageRecord {
            message_id: MessageId::new(),
            conversation_id,
            sender_id: actor,
            content,
            content_type: ContentType::System,
            reply_to_id: None,
            created_at: now,
            edited_at: None,
            deleted_at: None,
        };
        self.message_repo.insert_in_tx(tx, &record).await?;
        self.conversation_repo
            .touch_updated_at_in_tx(tx, conversation_id, now)
            .await?;

        let sender_name = self
            .user_repo
            .display_names_in_tx(tx, &[actor])
            .await?
            .into_iter()
            .map(|(_, name)| name)
            .next()
            .unwrap_or_default();
        let recipients = self
            .participant_repo
            .user_ids_in_tx(tx, conversation_id)
            .await?
            .into_iter()
            .filter(|&u| u != actor)
            .collect();

        Ok(SentMessage {
            record,
            sender_name,
            recipients,
            reply_preview: None,
        })
    }

    async fn display_name_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        user_id: UserId,
    ) -> Result<String, GroupError> {
        Ok(self
            .user_repo
            .display_names_in_tx(tx, &[user_id])
            .await?
            .into_iter()
            .map(|(_, name)| name)
            .next()
            .unwrap_or_default())
    }

    async fn detail(&self, group: GroupRecord) -> Result<GroupDetail, GroupError> {
        let members = self
            .participant_repo
            .list_profiles(group.conversation_id)
            .await?
            .into_iter()
            .map(|p| GroupMember {
                user: p.user,
                role: p.role,
                joined_at: p.joined_at,
            })
            .collect();
        Ok(GroupDetail { group, members })
    }
}

#[async_trait::async_trait]
impl GroupService for RealGroupService {
    async fn create_group(
        &self,
        creator: UserId,
        input: CreateGroupInput,
    ) -> Result<GroupCreation, GroupError> {
        let name = input.name.trim();
        if name.is_empty() || name.chars().count() > MAX_GROUP_NAME {
            return Err(GroupError::Validation(format!(
                "Group name must be 1-{MAX_GROUP_NAME} characters"
            )));
        }

        // The creator is always a member; everyone else deduped.
        let mut member_ids: Vec<UserId> = Vec::new();
        let mut seen = HashSet::from([creator]);
        for id in input.member_ids {
            if seen.insert(id) {
                member_ids.push(id);
            }
        }

        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| GroupError::Store(e.to_string()))?;

        let mut all_ids = member_ids.clone();
        all_ids.push(creator);
        let existing = self
            .user_repo
            .count_existing_in_tx(&mut *tx, &all_ids)
            .await?;
        if existing != all_ids.len() as u64 {
            return Err(GroupError::Validation(
                "One or more members do not exist".into(),
            ));
        }

        // One transaction end to end: conversation -> participants -> group
        // row -> SYSTEM message.
        let now = Utc::now();
        let conversation_id = ConversationId::new();
        self.conversation_repo
            .create_in_tx(&mut *tx, conversation_id, ConversationKind::Group, now)
            .await?;
        self.participant_repo
            .insert_in_tx(&mut *tx, conversation_id, creator, ParticipantRole::Admin, now)
            .await?;
        for &member in &member_ids {
            self.participant_repo
                .insert_in_tx(&mut *tx, conversation_id, member, ParticipantRole::Member, now)
                .await?;
        }

        let group = GroupRecord {
            group_id: GroupId::new(),
            conversation_id,
            name: name.to_owned(),
            description: input.description.clone(),
            icon_url: None,
            created_by: creator,
            created_at: now,
        };
        self.group_repo.insert_in_tx(&mut *tx, &group).await?;

        let system_message = self
            .system_message_in_tx(
                &mut *tx,
                conversation_id,
                creator,
                format!("created the group \"{name}\""),
                now,
            )
            .await?;

        tx.commit()
            .await
            .map_err(|e| GroupError::Store(e.to_string()))?;

        let detail = self.detail(group).await?;
        Ok(GroupCreation {
            detail,
            system_message,
        })
    }

    async fn get_group(&self, me: UserId, group_id: GroupId) -> Result<GroupDetail, GroupError> {
        let group = self
            .group_repo
            .get(group_id)
            .await?
            .ok_or(GroupError::NotFound)?;
        if !self
            .participant_repo
            .is_participant(group.conversation_id, me)
            .await?
        {
            return Err(GroupError::NotMember);
        }
        self.detail(group).await
    }

    async fn update_group(
        &self,
        me: UserId,
        group_id: GroupId,
        patch: GroupPatch,
    ) -> Result<GroupUpdate, GroupError> {
        if patch.is_empty() {
            return Err(GroupError::Validation("Nothing to update".into()));
        }
        if let Some(name) = &patch.name {
            let trimmed = name.trim();
            if trimmed.is_empty() || trimmed.chars().count() > MAX_GROUP_NAME {
                return Err(GroupError::Validation(format!(
                    "Group name must be 1-{MAX_GROUP_NAME} characters"
                )));
            }
        }

        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| GroupError::Store(e.to_string()))?;

        let group = self
            .group_repo
            .get_in_tx(&mut *tx, group_id)
            .await?
            .ok_or(GroupError::NotFound)?;
        self.admin_guard(&mut *tx, group.conversation_id, me).await?;

        self.group_repo
            .update_in_tx(&mut *tx, group_id, &patch)
            .await?;

        // Only a rename is an in-conversation event.
        let renamed = patch
            .name
            .as_deref()
            .map(str::trim)
            .filter(|&n| n != group.name);
        let system_message = match renamed {
            Some(new_name) => Some(
                self.system_message_in_tx(
                    &mut *tx,
                    group.conversation_id,
                    me,
                    format!("renamed the group to \"{new_name}\""),
                    Utc::now(),
                )
                .await?,
            ),
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| GroupError::Store(e.to_string()))?;

        let group = self
            .group_repo
            .get(group_id)
            .await?
            .ok_or(GroupError::NotFound)?;
        Ok(GroupUpdate {
            group,
            system_message,
        })
    }

    async fn add_members(
        &self,
        me: UserId,
        group_id: GroupId,
        member_ids: Vec<UserId>,
    ) -> Result<MembershipChange, GroupError> {
        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| GroupError::Store(e.to_string()))?;

        let group = self
            .group_repo
            .get_in_tx(&mut *tx, group_id)
            .await?
            .ok_or(GroupError::NotFound)?;
        self.admin_guard(&mut *tx, group.conversation_id, me).await?;

        let present: HashSet<UserId> = self
            .participant_repo
            .user_ids_in_tx(&mut *tx, group.conversation_id)
            .await?
            .into_iter()
            .collect();

        let mut to_add: Vec<UserId> = Vec::new();
        let mut seen = HashSet::new();
        for id in member_ids {
            if !present.contains(&id) && seen.insert(id) {
                to_add.push(id);
            }
        }
        if to_add.is_empty() {
            return Err(GroupError::Validation("No new members to add".into()));
        }

        let existing = self.user_repo.count_existing_in_tx(&mut *tx, &to_add).await?;
        if existing != to_add.len() as u64 {
            return Err(GroupError::Validation(
                "One or more members do not exist".into(),
            ));
        }

        let now = Utc::now();
        for &member in &to_add {
            self.participant_repo
                .insert_in_tx(
                    &mut *tx,
                    group.conversation_id,
                    member,
                    ParticipantRole::Member,
                    now,
                )
                .await?;
        }

        let names: Vec<String> = self
            .user_repo
            .display_names_in_tx(&mut *tx, &to_add)
            .await?
            .into_iter()
            .map(|(_, name)| name)
            .collect();
        let system_message = self
            .system_message_in_tx(
                &mut *tx,
                group.conversation_id,
                me,
                format!("added {}", names.join(", ")),
                now,
            )
            .await?;

        tx.commit()
            .await
            .map_err(|e| GroupError::Store(e.to_string()))?;

        let mut added = Vec::with_capacity(to_add.len());
        for profile in self
            .participant_repo
            .list_profiles(group.conversation_id)
            .await?
        {
            if to_add.contains(&profile.user.user_id) {
                added.push(profile.user);
            }
        }

        Ok(MembershipChange {
            added,
            system_message,
        })
    }

    async fn remove_member(
        &self,
        me: UserId,
        group_id: GroupId,
        target: UserId,
    ) -> Result<MemberRemoval, GroupError> {
        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| GroupError::Store(e.to_string()))?;

        let group = self
            .group_repo
            .get_in_tx(&mut *tx, group_id)
            .await?
            .ok_or(GroupError::NotFound)?;
        let conversation_id = group.conversation_id;

        let leaving = me == target;
        if leaving {
            // Any member may leave; no admin check.
            self.participant_repo
                .get_in_tx(&mut *tx, conversation_id, me)
                .await?
                .ok_or(GroupError::NotMember)?;
        } else {
            self.admin_guard(&mut *tx, conversation_id, me).await?;
        }

        let removed_row = self
            .participant_repo
            .get_in_tx(&mut *tx, conversation_id, target)
            .await?
            .ok_or_else(|| GroupError::Validation("User is not a group member".into()))?;

        let target_name = self.display_name_in_tx(&mut *tx, target).await?;

        if !self
            .participant_repo
            .remove_in_tx(&mut *tx, conversation_id, target)
            .await?
        {
            return Err(GroupError::Validation("User is not a group member".into()));
        }

        // An admin's departure must not leave the group admin-less: the
        // longest-standing remaining member inherits the role.
        let mut promoted_admin = None;
        if removed_row.role == ParticipantRole::Admin
            && self
                .participant_repo
                .admin_count_in_tx(&mut *tx, conversation_id)
                .await?
                == 0
        {
            if let Some(oldest) = self
                .participant_repo
                .oldest_member_in_tx(&mut *tx, conversation_id)
                .await?
            {
                self.participant_repo
                    .update_role_in_tx(&mut *tx, conversation_id, oldest, ParticipantRole::Admin)
                    .await?;
                promoted_admin = Some(oldest);
            }
        }

        let content = if leaving {
            format!("{target_name} left the group")
        } else {
            format!("removed {target_name}")
        };
        let system_message = self
            .system_message_in_tx(&mut *tx, conversation_id, me, content, Utc::now())
            .await?;

        tx.commit()
            .await
            .map_err(|e| GroupError::Store(e.to_string()))?;

        Ok(MemberRemoval {
            removed: target,
            promoted_admin,
            system_message,
        })
    }

    async fn update_role(
        &self,
        me: UserId,
        group_id: GroupId,
        target: UserId,
        role: ParticipantRole,
    ) -> Result<(), GroupError> {
        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| GroupError::Store(e.to_string()))?;

        let group = self
            .group_repo
            .get_in_tx(&mut *tx, group_id)
            .await?
            .ok_or(GroupError::NotFound)?;
        self.admin_guard(&mut *tx, group.conversation_id, me).await?;

        let participant = self
            .participant_repo
            .get_in_tx(&mut *tx, group.conversation_id, target)
            .await?
            .ok_or_else(|| GroupError::Validation("User is not a group member".into()))?;

        if participant.role == ParticipantRole::Admin
            && role == ParticipantRole::Member
            && self
                .participant_repo
                .admin_count_in_tx(&mut *tx, group.conversation_id)
                .await?
                <= 1
        {
            return Err(GroupError::Validation(
                "Cannot demote the only admin".into(),
            ));
        }

        self.participant_repo
            .update_role_in_tx(&mut *tx, group.conversation_id, target, role)
            .await?;

        tx.commit()
            .await
            .map_err(|e| GroupError::Store(e.to_string()))?;
        Ok(())
    }
}
